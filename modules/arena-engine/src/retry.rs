//! Bounded retry around oracle calls.
//!
//! Each attempt runs under a deadline and races the run's cancel signal.
//! Backoff between attempts is exponential with uniform jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

use arena_common::{OracleError, RetryConfig};

use crate::cancel::CancelSignal;

/// The policy gave up. `attempts` counts calls actually started.
#[derive(Error, Debug)]
#[error("{error} (after {attempts} attempt(s))")]
pub struct Exhausted {
    pub attempts: u32,
    #[source]
    pub error: OracleError,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_jitter: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    /// One attempt, no backoff.
    pub fn once(timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_jitter: Duration::ZERO,
            timeout,
        }
    }

    /// Backoff before attempt `attempt + 1`, excluding jitter. `attempt` is 1-based.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16) as i32;
        self.base_delay.mul_f64(self.multiplier.powi(exp))
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }

    /// Run `op` until it succeeds, the attempts run out, or the run is cancelled.
    ///
    /// On success returns the value and the number of attempts it took.
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        cancel: &CancelSignal,
        mut op: F,
    ) -> Result<(T, u32), Exhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OracleError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(Exhausted {
                    attempts: attempt,
                    error: OracleError::Cancelled,
                });
            }
            attempt += 1;

            let result = tokio::select! {
                _ = cancel.cancelled() => Err(OracleError::Cancelled),
                outcome = tokio::time::timeout(self.timeout, op()) => match outcome {
                    Ok(inner) => inner,
                    Err(_) => Err(OracleError::Timeout(self.timeout)),
                },
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(label, attempt, "Oracle call succeeded after retry");
                    }
                    return Ok((value, attempt));
                }
                Err(error) => error,
            };

            if !error.is_retryable() || attempt >= max_attempts {
                warn!(label, attempt, error = %error, "Oracle call failed, giving up");
                return Err(Exhausted {
                    attempts: attempt,
                    error,
                });
            }

            let backoff = self.delay_for(attempt) + self.jitter();
            warn!(label, attempt, error = %error, backoff_ms = backoff.as_millis() as u64, "Oracle call failed, retrying");

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(Exhausted {
                        attempts: attempt,
                        error: OracleError::Cancelled,
                    });
                }
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay(),
            multiplier: config.multiplier,
            max_jitter: config.max_jitter(),
            timeout: config.timeout(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
            multiplier: 2.0,
            max_jitter: Duration::ZERO,
            timeout: Duration::from_millis(50),
        }
    }

    #[test]
    fn delay_grows_geometrically() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            multiplier: 3.0,
            ..fast(5)
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(300));
        assert_eq!(policy.delay_for(3), Duration::from_millis(900));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = fast(3)
            .run("flaky", &CancelSignal::never(), move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(OracleError::Malformed("garbled".into()))
                } else {
                    Ok("ok")
                }
            })
            .await
            .unwrap();
        assert_eq!(result, ("ok", 3));
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = fast(2)
            .run("broken", &CancelSignal::never(), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(OracleError::Validation("blank title".into()))
            })
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(err.error, OracleError::Validation(_)));
    }

    #[tokio::test]
    async fn slow_attempts_time_out() {
        let err = RetryPolicy::once(Duration::from_millis(50))
            .run("slow", &CancelSignal::never(), || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, OracleError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err.error, OracleError::Timeout(_)));
    }

    #[tokio::test]
    async fn single_attempt_policy_does_not_retry() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = RetryPolicy::once(Duration::from_millis(50))
            .run("one-shot", &CancelSignal::never(), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(OracleError::Malformed("garbled".into()))
            })
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_run_skips_the_call() {
        let (handle, signal) = CancelSignal::new();
        handle.cancel();
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = fast(3)
            .run("cancelled", &signal, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, OracleError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err.error, OracleError::Cancelled));
        assert_eq!(err.attempts, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancellation_is_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = fast(5)
            .run("aborted", &CancelSignal::never(), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(OracleError::Cancelled)
            })
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
