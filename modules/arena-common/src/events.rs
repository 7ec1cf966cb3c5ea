//! Engine events: everything the ranking loop reports to its observability hook.
//!
//! Each variant carries the ids an external store needs to rebuild the run:
//! generation numbers, candidate ids, and (on the envelope, see
//! `arena_engine::observe::EventRecord`) the run id and parent event id.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArenaEvent {
    RunStarted {
        problem_statement: String,
        generations: u32,
        rounds_per_tournament: u32,
    },

    GenerationSeeded {
        generation: u32,
        candidate_ids: Vec<String>,
        attempts: u32,
    },

    SeedingFailed {
        error: String,
        attempts: u32,
    },

    TournamentStarted {
        generation: u32,
        pool_size: usize,
        rounds: u32,
    },

    RoundStarted {
        generation: u32,
        round: u32,
        pairs: usize,
        sitting_out: Option<String>,
    },

    ComparisonAttempted {
        generation: u32,
        round: u32,
        candidate_a: String,
        candidate_b: String,
    },

    ComparisonSucceeded {
        generation: u32,
        round: u32,
        winner_id: String,
        loser_id: String,
        reasoning: String,
        attempts: u32,
    },

    ComparisonFailed {
        generation: u32,
        round: u32,
        candidate_a: String,
        candidate_b: String,
        error: String,
        attempts: u32,
    },

    RatingUpdated {
        winner_id: String,
        loser_id: String,
        winner_before: f64,
        winner_after: f64,
        loser_before: f64,
        loser_after: f64,
    },

    TournamentCompleted {
        generation: u32,
        comparisons_succeeded: u32,
        comparisons_failed: u32,
    },

    EvolutionStarted {
        generation: u32,
        selected_ids: Vec<String>,
    },

    EvolutionAttempted {
        generation: u32,
        parent_id: String,
        parent_rating: f64,
    },

    EvolutionSucceeded {
        generation: u32,
        parent_id: String,
        candidate_id: String,
        improvement_note: Option<String>,
        attempts: u32,
    },

    EvolutionFailed {
        generation: u32,
        parent_id: String,
        error: String,
        attempts: u32,
    },

    GenerationCompleted {
        generation: u32,
        pool_size: usize,
        evolved: usize,
    },

    FinalSelectionMade {
        candidate_ids: Vec<String>,
        ratings: Vec<f64>,
    },

    ReportBuilt {
        title: String,
    },

    ReportFailed {
        error: String,
    },

    RunCompleted {
        pool_size: usize,
        comparisons_succeeded: u32,
        comparisons_failed: u32,
        evolutions_succeeded: u32,
        evolutions_failed: u32,
    },
}

impl ArenaEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ArenaEvent::RunStarted { .. } => "run_started",
            ArenaEvent::GenerationSeeded { .. } => "generation_seeded",
            ArenaEvent::SeedingFailed { .. } => "seeding_failed",
            ArenaEvent::TournamentStarted { .. } => "tournament_started",
            ArenaEvent::RoundStarted { .. } => "round_started",
            ArenaEvent::ComparisonAttempted { .. } => "comparison_attempted",
            ArenaEvent::ComparisonSucceeded { .. } => "comparison_succeeded",
            ArenaEvent::ComparisonFailed { .. } => "comparison_failed",
            ArenaEvent::RatingUpdated { .. } => "rating_updated",
            ArenaEvent::TournamentCompleted { .. } => "tournament_completed",
            ArenaEvent::EvolutionStarted { .. } => "evolution_started",
            ArenaEvent::EvolutionAttempted { .. } => "evolution_attempted",
            ArenaEvent::EvolutionSucceeded { .. } => "evolution_succeeded",
            ArenaEvent::EvolutionFailed { .. } => "evolution_failed",
            ArenaEvent::GenerationCompleted { .. } => "generation_completed",
            ArenaEvent::FinalSelectionMade { .. } => "final_selection_made",
            ArenaEvent::ReportBuilt { .. } => "report_built",
            ArenaEvent::ReportFailed { .. } => "report_failed",
            ArenaEvent::RunCompleted { .. } => "run_completed",
        }
    }

    /// JSON payload for external stores.
    pub fn to_payload(&self) -> serde_json::Value {
        // Every variant is plain data, so this cannot fail; fall back to Null
        // rather than panic inside a hook.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload.clone())
    }

    /// Generation the event belongs to, when it belongs to one.
    pub fn generation(&self) -> Option<u32> {
        match self {
            ArenaEvent::GenerationSeeded { generation, .. }
            | ArenaEvent::TournamentStarted { generation, .. }
            | ArenaEvent::RoundStarted { generation, .. }
            | ArenaEvent::ComparisonAttempted { generation, .. }
            | ArenaEvent::ComparisonSucceeded { generation, .. }
            | ArenaEvent::ComparisonFailed { generation, .. }
            | ArenaEvent::TournamentCompleted { generation, .. }
            | ArenaEvent::EvolutionStarted { generation, .. }
            | ArenaEvent::EvolutionAttempted { generation, .. }
            | ArenaEvent::EvolutionSucceeded { generation, .. }
            | ArenaEvent::EvolutionFailed { generation, .. }
            | ArenaEvent::GenerationCompleted { generation, .. } => Some(*generation),
            _ => None,
        }
    }
}
