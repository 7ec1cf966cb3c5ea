pub mod claude;
pub mod judge;
pub mod parse;
pub mod prompt;
pub mod proposer;
pub mod refiner;
pub mod reporter;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use arena_common::{AppConfig, ModelsConfig};
use arena_engine::Oracles;

pub use claude::{ChatModel, Claude};
pub use judge::Judge;
pub use proposer::Proposer;
pub use refiner::Refiner;
pub use reporter::Reporter;

/// Wire one Claude client per oracle, each on its configured model.
pub fn claude_oracles(app: &AppConfig, models: &ModelsConfig) -> Oracles {
    let client = |model: &str| -> Arc<dyn ChatModel> {
        let claude =
            Claude::new(&app.anthropic_api_key, model).with_max_tokens(models.max_tokens);
        match app.anthropic_base_url.as_deref() {
            Some(url) => Arc::new(claude.with_base_url(url)),
            None => Arc::new(claude),
        }
    };

    Oracles {
        generation: Arc::new(Proposer::new(client(&models.generation), models.seed_count)),
        comparison: Arc::new(Judge::new(client(&models.comparison))),
        evolution: Arc::new(Refiner::new(client(&models.evolution))),
        report: Arc::new(Reporter::new(client(&models.report))),
    }
}
