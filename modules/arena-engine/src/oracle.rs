// Oracle seams.
//
// The engine never generates, judges or rewrites proposals itself. Those
// decisions come from external collaborators behind these four traits, which
// lets tests drive the full loop with deterministic mocks (see `testing`).
//
// Responses are typed on arrival; the engine still validates them (blank
// fields, foreign winner ids, duplicate ids) before acting on them.

use std::collections::HashSet;

use async_trait::async_trait;

use arena_common::{
    Candidate, CandidateDraft, ComparisonOutcome, EvolvedDraft, OracleError, Problem,
    RankedCandidate, Report,
};

use crate::report::DerivedSummaries;

#[async_trait]
pub trait GenerationOracle: Send + Sync {
    /// Produce the generation-0 proposals for `problem`.
    async fn generate(&self, problem: &Problem) -> Result<Vec<CandidateDraft>, OracleError>;
}

#[async_trait]
pub trait ComparisonOracle: Send + Sync {
    /// Pick the better of two proposals. The returned ids must be exactly
    /// `a.id` and `b.id`.
    async fn compare(&self, a: &Candidate, b: &Candidate)
        -> Result<ComparisonOutcome, OracleError>;
}

#[async_trait]
pub trait EvolutionOracle: Send + Sync {
    /// Rewrite `candidate` using the aggregate `feedback` (may be empty).
    async fn evolve(&self, candidate: &Candidate, feedback: &str)
        -> Result<EvolvedDraft, OracleError>;
}

#[async_trait]
pub trait ReportOracle: Send + Sync {
    async fn build_report(
        &self,
        problem: &Problem,
        finalists: &[RankedCandidate],
        derived: &DerivedSummaries,
    ) -> Result<Report, OracleError>;
}

// ---------------------------------------------------------------------------
// Boundary validation
// ---------------------------------------------------------------------------

/// Check a seeding batch: non-empty, every draft complete, suggested ids unique.
pub fn validate_seed_batch(drafts: &[CandidateDraft]) -> Result<(), OracleError> {
    if drafts.is_empty() {
        return Err(OracleError::Validation(
            "generation oracle returned no candidates".into(),
        ));
    }

    let mut seen = HashSet::new();
    for (i, draft) in drafts.iter().enumerate() {
        let missing = draft.missing_fields();
        if !missing.is_empty() {
            return Err(OracleError::Validation(format!(
                "candidate {} is missing {}",
                i + 1,
                missing.join(", ")
            )));
        }
        if let Some(id) = draft.id.as_deref().map(str::trim) {
            if id.is_empty() {
                return Err(OracleError::Validation(format!(
                    "candidate {} has a blank id",
                    i + 1
                )));
            }
            if !seen.insert(id.to_string()) {
                return Err(OracleError::Validation(format!("duplicate candidate id '{id}'")));
            }
        }
    }
    Ok(())
}

/// Check that the judge named exactly the two candidates it was shown.
pub fn validate_outcome(
    outcome: &ComparisonOutcome,
    a: &Candidate,
    b: &Candidate,
) -> Result<(), OracleError> {
    let named = (outcome.winner_id.as_str(), outcome.loser_id.as_str());
    let expected = [(a.id.as_str(), b.id.as_str()), (b.id.as_str(), a.id.as_str())];
    if expected.contains(&named) {
        Ok(())
    } else {
        Err(OracleError::Malformed(format!(
            "judge returned winner '{}' / loser '{}' for pair ('{}', '{}')",
            outcome.winner_id, outcome.loser_id, a.id, b.id
        )))
    }
}

pub fn validate_evolved(evolved: &EvolvedDraft) -> Result<(), OracleError> {
    let missing = evolved.draft.missing_fields();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(OracleError::Validation(format!(
            "evolved candidate is missing {}",
            missing.join(", ")
        )))
    }
}
