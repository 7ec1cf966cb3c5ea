//! Reporter: turns the finalists and their summaries into a markdown brief.

use std::sync::Arc;

use async_trait::async_trait;

use arena_common::{OracleError, Problem, RankedCandidate, Report};
use arena_engine::{DerivedSummaries, ReportOracle};

use crate::claude::ChatModel;
use crate::parse::strip_code_fence;
use crate::prompt;

pub struct Reporter {
    model: Arc<dyn ChatModel>,
}

impl Reporter {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl ReportOracle for Reporter {
    async fn build_report(
        &self,
        problem: &Problem,
        finalists: &[RankedCandidate],
        derived: &DerivedSummaries,
    ) -> Result<Report, OracleError> {
        let user = prompt::reporter_user(problem, finalists, derived);
        let response = self.model.complete(prompt::reporter_system(), &user).await?;

        let body = strip_code_fence(&response).to_string();
        if body.is_empty() {
            return Err(OracleError::Malformed("report body is empty".into()));
        }
        let title = body
            .lines()
            .find_map(|line| line.strip_prefix("# "))
            .map(|t| t.trim().to_string())
            .unwrap_or_else(|| format!("Proposals for: {}", problem.statement.trim()));

        Ok(Report { title, body })
    }
}
