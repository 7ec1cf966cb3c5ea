//! Proposer: seeds generation 0 from the problem statement.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use arena_common::{CandidateDraft, OracleError, Problem};
use arena_engine::GenerationOracle;

use crate::claude::ChatModel;
use crate::parse::parse_json;
use crate::prompt;

/// Models answer either `{"proposals": [...]}` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProposalBatch {
    Wrapped { proposals: Vec<CandidateDraft> },
    Bare(Vec<CandidateDraft>),
}

impl ProposalBatch {
    fn into_drafts(self) -> Vec<CandidateDraft> {
        match self {
            ProposalBatch::Wrapped { proposals } => proposals,
            ProposalBatch::Bare(proposals) => proposals,
        }
    }
}

pub struct Proposer {
    model: Arc<dyn ChatModel>,
    count: usize,
}

impl Proposer {
    pub fn new(model: Arc<dyn ChatModel>, count: usize) -> Self {
        Self {
            model,
            count: count.max(1),
        }
    }
}

#[async_trait]
impl GenerationOracle for Proposer {
    async fn generate(&self, problem: &Problem) -> Result<Vec<CandidateDraft>, OracleError> {
        let system = prompt::proposer_system();
        let user = prompt::proposer_user(problem, self.count);

        info!(requested = self.count, "Proposer generating seed proposals");
        let response = self.model.complete(&system, &user).await?;

        let batch: ProposalBatch = parse_json("proposal batch", &response)?;
        let mut drafts = batch.into_drafts();
        // Blank ids are treated as absent so the engine assigns one.
        for draft in &mut drafts {
            if draft.id.as_deref().is_some_and(|id| id.trim().is_empty()) {
                draft.id = None;
            }
        }
        Ok(drafts)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::ScriptedModel;

    use super::*;

    #[tokio::test]
    async fn parses_wrapped_batch() {
        let model = Arc::new(ScriptedModel::new().reply(
            r#"```json
{"proposals": [
  {"id": "bus_lanes", "title": "Bus lanes", "description": "Paint them", "rationale": "Faster buses",
   "stakeholder_impacts": {"riders": "shorter trips"}, "implementation_challenges": ["parking loss"],
   "equity_note": null},
  {"id": "", "title": "Tolls", "description": "Charge entry", "rationale": "Price congestion"}
]}
```"#,
        ));
        let proposer = Proposer::new(model.clone(), 2);

        let drafts = proposer.generate(&Problem::new("Cut traffic")).await.unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].id.as_deref(), Some("bus_lanes"));
        assert_eq!(drafts[0].stakeholder_impacts["riders"], "shorter trips");
        assert!(drafts[1].id.is_none());

        let prompts = model.prompts();
        assert!(prompts[0].1.contains("Generate 2 distinct proposals."));
    }

    #[tokio::test]
    async fn accepts_bare_array() {
        let model = Arc::new(ScriptedModel::new().reply(
            r#"[{"title": "Tolls", "description": "Charge entry", "rationale": "Price congestion"}]"#,
        ));
        let drafts = Proposer::new(model, 1)
            .generate(&Problem::new("Cut traffic"))
            .await
            .unwrap();
        assert_eq!(drafts[0].title, "Tolls");
    }

    #[tokio::test]
    async fn transport_and_parse_errors_are_classified() {
        let model = Arc::new(ScriptedModel::new().fail("503 overloaded").reply("not json"));
        let proposer = Proposer::new(model, 3);
        let problem = Problem::new("Cut traffic");

        assert!(matches!(
            proposer.generate(&problem).await,
            Err(OracleError::Upstream(_))
        ));
        assert!(matches!(
            proposer.generate(&problem).await,
            Err(OracleError::Malformed(_))
        ));
    }
}
