//! Refiner: rewrites a leading proposal using tournament feedback.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use arena_common::{Candidate, CandidateDraft, EvolvedDraft, OracleError};
use arena_engine::EvolutionOracle;

use crate::claude::ChatModel;
use crate::parse::parse_json;
use crate::prompt;

#[derive(Deserialize)]
struct RefinedProposal {
    #[serde(flatten)]
    draft: CandidateDraft,
    #[serde(default)]
    improvement_note: String,
}

pub struct Refiner {
    model: Arc<dyn ChatModel>,
}

impl Refiner {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl EvolutionOracle for Refiner {
    async fn evolve(&self, candidate: &Candidate, feedback: &str) -> Result<EvolvedDraft, OracleError> {
        let system = prompt::refiner_system();
        let user = prompt::refiner_user(candidate, feedback);
        let response = self.model.complete(&system, &user).await?;

        let refined: RefinedProposal = parse_json("refined proposal", &response)?;
        let mut draft = refined.draft;
        // The engine derives the successor's id.
        draft.id = None;
        Ok(EvolvedDraft {
            draft,
            improvement_note: refined.improvement_note,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::ScriptedModel;

    use super::*;

    #[tokio::test]
    async fn returns_draft_and_note_without_id() {
        let model = Arc::new(ScriptedModel::new().reply(
            r#"{"id": "x", "title": "Bus lanes v2", "description": "Paint and enforce",
                "rationale": "Enforcement keeps lanes clear", "improvement_note": "Added enforcement"}"#,
        ));
        let parent = Candidate::seed("lanes", CandidateDraft::new("Bus lanes", "Paint", "Faster"));

        let evolved = Refiner::new(model.clone())
            .evolve(&parent, "1. Bus lanes [lanes] rating 1216.0 (generation 0)")
            .await
            .unwrap();
        assert!(evolved.draft.id.is_none());
        assert_eq!(evolved.draft.title, "Bus lanes v2");
        assert_eq!(evolved.improvement_note, "Added enforcement");

        let (_, user) = &model.prompts()[0];
        assert!(user.contains("TOURNAMENT FEEDBACK"));
    }

    #[tokio::test]
    async fn missing_note_defaults_to_empty() {
        let model = Arc::new(ScriptedModel::new().reply(
            r#"{"title": "T", "description": "D", "rationale": "R"}"#,
        ));
        let parent = Candidate::seed("p", CandidateDraft::new("T", "D", "R"));
        let evolved = Refiner::new(model).evolve(&parent, "").await.unwrap();
        assert!(evolved.improvement_note.is_empty());
    }
}
