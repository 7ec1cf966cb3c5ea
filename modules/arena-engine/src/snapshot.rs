//! RunSnapshot for writing a finished run to disk and reading it back.

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use arena_common::{
    Candidate, ComparisonRecord, EngineConfig, EngineError, Problem, RankedCandidate, Report,
};

use crate::controller::{RunOutcome, RunStats};
use crate::pool::CandidatePool;
use crate::rating::RatingStore;
use crate::report::DerivedSummaries;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub problem: Problem,
    pub config: EngineConfig,
    /// Whole pool in insertion order.
    pub candidates: Vec<Candidate>,
    pub ratings: RatingStore,
    pub comparisons: Vec<ComparisonRecord>,
    pub finalists: Vec<RankedCandidate>,
    pub derived: DerivedSummaries,
    pub report: Option<Report>,
    pub report_error: Option<String>,
    pub stats: RunStats,
}

impl RunSnapshot {
    pub fn capture(outcome: &RunOutcome, config: &EngineConfig) -> Self {
        Self {
            run_id: outcome.run_id.clone(),
            started_at: outcome.started_at,
            finished_at: outcome.finished_at,
            problem: outcome.problem.clone(),
            config: config.clone(),
            candidates: outcome.pool.iter().cloned().collect(),
            ratings: outcome.ratings.clone(),
            comparisons: outcome.comparisons.clone(),
            finalists: outcome.finalists.clone(),
            derived: outcome.derived.clone(),
            report: outcome.report.clone(),
            report_error: outcome.report_error.clone(),
            stats: outcome.stats.clone(),
        }
    }

    /// Rebuild the candidate pool. Fails if the file was edited into holding
    /// duplicate ids.
    pub fn pool(&self) -> Result<CandidatePool, EngineError> {
        CandidatePool::from_candidates(self.candidates.clone())
            .map_err(|e| EngineError::Snapshot(e.into()))
    }

    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        write_json(self, path).map_err(EngineError::Snapshot)
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        read_json(path).map_err(EngineError::Snapshot)
    }
}

fn write_json(snapshot: &RunSnapshot, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn read_json(path: &Path) -> anyhow::Result<RunSnapshot> {
    let json =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let snapshot = serde_json::from_str(&json)
        .with_context(|| format!("parsing snapshot {}", path.display()))?;
    Ok(snapshot)
}
