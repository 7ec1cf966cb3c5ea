use std::time::Duration;

use thiserror::Error;

/// Why a single oracle call did not produce a usable answer.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),

    #[error("oracle call cancelled")]
    Cancelled,

    /// The response could not be parsed into the expected shape.
    #[error("malformed oracle response: {0}")]
    Malformed(String),

    /// The response parsed but broke a structural rule (blank fields,
    /// foreign winner id, duplicate ids).
    #[error("invalid oracle response: {0}")]
    Validation(String),

    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

impl OracleError {
    /// Cancellation ends the call for good; everything else is worth another try.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, OracleError::Cancelled)
    }
}

/// Errors that stop a run, or stop it from starting.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The generation oracle failed or returned unusable candidates. Fatal:
    /// without generation 0 there is nothing to rank.
    #[error("seeding failed for problem '{problem_statement}' after {attempts} attempt(s): {source}")]
    Seeding {
        problem_statement: String,
        attempts: u32,
        #[source]
        source: OracleError,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("snapshot error: {0}")]
    Snapshot(#[source] anyhow::Error),
}
