//! Judge: pairwise comparison of two proposals.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use arena_common::{Candidate, ComparisonOutcome, OracleError};
use arena_engine::ComparisonOracle;

use crate::claude::ChatModel;
use crate::parse::parse_json;
use crate::prompt;

#[derive(Deserialize)]
struct Verdict {
    winner_id: String,
    #[serde(default)]
    reasoning: String,
}

pub struct Judge {
    model: Arc<dyn ChatModel>,
}

impl Judge {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl ComparisonOracle for Judge {
    async fn compare(&self, a: &Candidate, b: &Candidate) -> Result<ComparisonOutcome, OracleError> {
        let user = prompt::judge_user(a, b);
        let response = self.model.complete(prompt::judge_system(), &user).await?;
        let verdict: Verdict = parse_json("judge verdict", &response)?;

        let winner = verdict.winner_id.trim();
        let (winner, loser) = if winner == a.id {
            (a, b)
        } else if winner == b.id {
            (b, a)
        } else {
            return Err(OracleError::Malformed(format!(
                "judge picked '{winner}', expected '{}' or '{}'",
                a.id, b.id
            )));
        };

        debug!(winner = winner.id.as_str(), loser = loser.id.as_str(), "Judge verdict");
        Ok(ComparisonOutcome {
            winner_id: winner.id.clone(),
            loser_id: loser.id.clone(),
            reasoning: verdict.reasoning.trim().to_string(),
        })
    }
}
