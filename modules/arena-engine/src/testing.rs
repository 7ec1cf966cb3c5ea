// Test mocks for the arena engine.
//
// One mock per oracle seam:
// - ScriptedGenerator (GenerationOracle): fixed seed batch, optional failures
// - RuleJudge (ComparisonOracle): preference-list verdicts, per-id failures
// - EchoRefiner (EvolutionOracle): copies the parent with a marked title
// - StaticReporter (ReportOracle): canned report or a hard failure
//
// Plus helpers for drafts, pools and a fast engine config.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;

use arena_common::{
    Candidate, CandidateDraft, ComparisonOutcome, EngineConfig, EvolvedDraft, OracleError,
    Problem, RankedCandidate, Report, RetryConfig,
};

use crate::cancel::CancelHandle;
use crate::controller::Oracles;
use crate::oracle::{ComparisonOracle, EvolutionOracle, GenerationOracle, ReportOracle};
use crate::pool::CandidatePool;
use crate::report::DerivedSummaries;
use crate::retry::RetryPolicy;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Complete drafts with the given suggested ids. Each names one stakeholder.
pub fn drafts(ids: &[&str]) -> Vec<CandidateDraft> {
    ids.iter()
        .map(|id| {
            CandidateDraft::new(
                format!("Proposal {id}"),
                format!("What {id} does"),
                format!("Why {id} works"),
            )
            .with_id(*id)
            .with_stakeholder("residents", format!("{id} affects residents"))
        })
        .collect()
}

/// A pool of generation-0 candidates built from [`drafts`].
pub fn seeded_pool(ids: &[&str]) -> CandidatePool {
    let candidates = drafts(ids)
        .into_iter()
        .zip(ids)
        .map(|(draft, id)| Candidate::seed(*id, draft))
        .collect();
    CandidatePool::from_candidates(candidates).unwrap_or_default()
}

/// No backoff, short deadline, two attempts.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::ZERO,
        multiplier: 1.0,
        max_jitter: Duration::ZERO,
        timeout: Duration::from_secs(5),
    }
}

/// Engine config with a fixed rng seed and no retry delays.
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        rng_seed: Some(42),
        retry: RetryConfig {
            max_attempts: 2,
            base_delay_ms: 0,
            multiplier: 1.0,
            max_jitter_ms: 0,
            timeout_secs: 5,
        },
        ..EngineConfig::default()
    }
}

pub fn oracles(
    generator: Arc<ScriptedGenerator>,
    judge: Arc<RuleJudge>,
    refiner: Arc<EchoRefiner>,
    reporter: Arc<StaticReporter>,
) -> Oracles {
    Oracles {
        generation: generator,
        comparison: judge,
        evolution: refiner,
        report: reporter,
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

/// Returns the same batch every call. `.fail_first(n)` makes the first `n`
/// calls return a malformed-response error; `.always_failing()` never succeeds.
pub struct ScriptedGenerator {
    drafts: Vec<CandidateDraft>,
    fail_first: usize,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(drafts: Vec<CandidateDraft>) -> Self {
        Self {
            drafts,
            fail_first: 0,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always_failing() -> Self {
        Self::new(Vec::new()).fail_first(usize::MAX)
    }

    pub fn fail_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationOracle for ScriptedGenerator {
    async fn generate(&self, _problem: &Problem) -> Result<Vec<CandidateDraft>, OracleError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(OracleError::Malformed(
                "ScriptedGenerator: scripted failure".into(),
            ));
        }
        Ok(self.drafts.clone())
    }
}

// ---------------------------------------------------------------------------
// RuleJudge
// ---------------------------------------------------------------------------

/// Picks the winner by a preference list: listed ids beat unlisted ones,
/// earlier beats later, and unlisted ids fall back to the smaller id.
pub struct RuleJudge {
    preference: Vec<String>,
    fail_involving: HashSet<String>,
    malformed_involving: HashSet<String>,
    delay: Duration,
    cancel_after: Option<(usize, CancelHandle)>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RuleJudge {
    pub fn new() -> Self {
        Self {
            preference: Vec::new(),
            fail_involving: HashSet::new(),
            malformed_involving: HashSet::new(),
            delay: Duration::ZERO,
            cancel_after: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn prefer(mut self, order: &[&str]) -> Self {
        self.preference = order.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Any comparison with `id` in it fails with an upstream error.
    pub fn fail_involving(mut self, id: &str) -> Self {
        self.fail_involving.insert(id.to_string());
        self
    }

    /// Any comparison with `id` in it names a winner that was not shown.
    pub fn malformed_involving(mut self, id: &str) -> Self {
        self.malformed_involving.insert(id.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fire `handle` once `n` calls have started.
    pub fn cancel_after(mut self, n: usize, handle: CancelHandle) -> Self {
        self.cancel_after = Some((n, handle));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping `compare` calls seen.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn rank(&self, id: &str) -> usize {
        self.preference
            .iter()
            .position(|p| p == id)
            .unwrap_or(self.preference.len())
    }

    fn prefers<'a>(&self, a: &'a Candidate, b: &'a Candidate) -> (&'a Candidate, &'a Candidate) {
        let key_a = (self.rank(&a.id), a.id.as_str());
        let key_b = (self.rank(&b.id), b.id.as_str());
        if key_a <= key_b {
            (a, b)
        } else {
            (b, a)
        }
    }

    async fn verdict(&self, a: &Candidate, b: &Candidate) -> Result<ComparisonOutcome, OracleError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let involved = |set: &HashSet<String>| set.contains(&a.id) || set.contains(&b.id);
        if involved(&self.fail_involving) {
            return Err(OracleError::Upstream(anyhow!(
                "RuleJudge: scripted failure for ({}, {})",
                a.id, b.id
            )));
        }
        if involved(&self.malformed_involving) {
            return Ok(ComparisonOutcome {
                winner_id: "ghost".into(),
                loser_id: b.id.clone(),
                reasoning: String::new(),
            });
        }
        let (winner, loser) = self.prefers(a, b);
        Ok(ComparisonOutcome {
            winner_id: winner.id.clone(),
            loser_id: loser.id.clone(),
            reasoning: format!("{} is preferred over {}", winner.title, loser.title),
        })
    }
}

impl Default for RuleJudge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComparisonOracle for RuleJudge {
    async fn compare(&self, a: &Candidate, b: &Candidate) -> Result<ComparisonOutcome, OracleError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((n, handle)) = &self.cancel_after {
            if call >= *n {
                handle.cancel();
            }
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let result = self.verdict(a, b).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ---------------------------------------------------------------------------
// EchoRefiner
// ---------------------------------------------------------------------------

/// Returns the parent's body with " (revised)" appended to the title.
/// Remembers the feedback text it was given.
pub struct EchoRefiner {
    fail_for: HashSet<String>,
    blank_note: bool,
    feedback: Mutex<Vec<String>>,
}

impl EchoRefiner {
    pub fn new() -> Self {
        Self {
            fail_for: HashSet::new(),
            blank_note: false,
            feedback: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_for(mut self, id: &str) -> Self {
        self.fail_for.insert(id.to_string());
        self
    }

    /// Return an empty improvement note.
    pub fn with_blank_note(mut self) -> Self {
        self.blank_note = true;
        self
    }

    pub fn feedback_seen(&self) -> Vec<String> {
        lock(&self.feedback).clone()
    }
}

impl Default for EchoRefiner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EvolutionOracle for EchoRefiner {
    async fn evolve(&self, candidate: &Candidate, feedback: &str) -> Result<EvolvedDraft, OracleError> {
        lock(&self.feedback).push(feedback.to_string());
        if self.fail_for.contains(&candidate.id) {
            return Err(OracleError::Upstream(anyhow!(
                "EchoRefiner: scripted failure for {}",
                candidate.id
            )));
        }

        let draft = CandidateDraft {
            id: None,
            title: format!("{} (revised)", candidate.title),
            description: candidate.description.clone(),
            rationale: candidate.rationale.clone(),
            stakeholder_impacts: candidate.stakeholder_impacts.clone(),
            implementation_challenges: candidate.implementation_challenges.clone(),
            equity_note: candidate.equity_note.clone(),
            economic_note: candidate.economic_note.clone(),
        };
        let improvement_note = if self.blank_note {
            String::new()
        } else {
            format!("revised {}", candidate.id)
        };
        Ok(EvolvedDraft {
            draft,
            improvement_note,
        })
    }
}

// ---------------------------------------------------------------------------
// StaticReporter
// ---------------------------------------------------------------------------

/// Lists the finalists' ids as the report body, or always fails.
pub struct StaticReporter {
    failing: bool,
    seen: Mutex<Option<DerivedSummaries>>,
}

impl StaticReporter {
    pub fn new() -> Self {
        Self {
            failing: false,
            seen: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    /// The summaries passed to the last call.
    pub fn last_summaries(&self) -> Option<DerivedSummaries> {
        lock(&self.seen).clone()
    }
}

impl Default for StaticReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReportOracle for StaticReporter {
    async fn build_report(
        &self,
        problem: &Problem,
        finalists: &[RankedCandidate],
        derived: &DerivedSummaries,
    ) -> Result<Report, OracleError> {
        *lock(&self.seen) = Some(derived.clone());
        if self.failing {
            return Err(OracleError::Upstream(anyhow!("StaticReporter: scripted failure")));
        }
        let ids: Vec<&str> = finalists.iter().map(|f| f.candidate.id.as_str()).collect();
        Ok(Report {
            title: format!("Report: {}", problem.statement),
            body: ids.join(", "),
        })
    }
}
