use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Tunables for one engine run. Every field has a default so a TOML file only
/// needs to name what it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Number of tournament generations, including generation 0.
    pub generations: u32,
    pub rounds_per_tournament: u32,
    /// Candidates evolved after each non-final tournament.
    pub evolve_top_k: usize,
    /// Finalists handed to the report assembler.
    pub final_top_n: usize,
    /// Upper bound on in-flight oracle calls within one round or evolution step.
    pub max_concurrent_calls: usize,
    /// Judge justifications quoted in the evolution feedback.
    pub feedback_reasons: usize,
    /// Fixes the pairing shuffle for reproducible runs.
    pub rng_seed: Option<u64>,
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            generations: 3,
            rounds_per_tournament: 5,
            evolve_top_k: 2,
            final_top_n: 3,
            max_concurrent_calls: 4,
            feedback_reasons: 5,
            rng_seed: None,
            retry: RetryConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.generations == 0 {
            return Err(EngineError::Config("generations must be at least 1".into()));
        }
        if self.rounds_per_tournament == 0 {
            return Err(EngineError::Config(
                "rounds_per_tournament must be at least 1".into(),
            ));
        }
        if self.max_concurrent_calls == 0 {
            return Err(EngineError::Config(
                "max_concurrent_calls must be at least 1".into(),
            ));
        }
        self.retry.validate()
    }
}

/// Backoff expressed as data. Delay before retry n (1-based) is
/// `base_delay * multiplier^(n-1)` plus up to `max_jitter` of noise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_jitter_ms: u64,
    /// Per-attempt deadline.
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            multiplier: 2.0,
            max_jitter_ms: 250,
            timeout_secs: 60,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_attempts == 0 {
            return Err(EngineError::Config("retry.max_attempts must be at least 1".into()));
        }
        if !(self.multiplier >= 1.0) {
            return Err(EngineError::Config("retry.multiplier must be >= 1.0".into()));
        }
        if self.timeout_secs == 0 {
            return Err(EngineError::Config("retry.timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_jitter(&self) -> Duration {
        Duration::from_millis(self.max_jitter_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Model names per oracle role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelsConfig {
    pub generation: String,
    pub comparison: String,
    pub evolution: String,
    pub report: String,
    /// Proposals requested from the generation oracle.
    pub seed_count: usize,
    /// Response token cap for every oracle call.
    pub max_tokens: u32,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            generation: "claude-sonnet-4-20250514".to_string(),
            comparison: "claude-sonnet-4-20250514".to_string(),
            evolution: "claude-sonnet-4-20250514".to_string(),
            report: "claude-sonnet-4-20250514".to_string(),
            seed_count: 6,
            max_tokens: 4096,
        }
    }
}

/// TOML-backed configuration loaded from disk.
/// Secrets (API keys) stay as env vars.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub engine: EngineConfig,
    pub models: ModelsConfig,
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    config
        .engine
        .validate()
        .with_context(|| format!("Invalid engine settings in {}", path.display()))?;
    Ok(config)
}

/// Secrets and environment-specific values.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub anthropic_api_key: String,
    /// Overrides the Messages API endpoint (proxies, recorded fixtures).
    pub anthropic_base_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY")
                .context("ANTHROPIC_API_KEY environment variable is required")?,
            anthropic_base_url: std::env::var("ANTHROPIC_BASE_URL").ok(),
        };

        config.log_keys();
        Ok(config)
    }

    fn log_keys(&self) {
        fn preview(val: &str) -> String {
            let head: String = val.chars().take(5).collect();
            format!("{head}...({} chars)", val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  ANTHROPIC_API_KEY: {}", preview(&self.anthropic_api_key));
        tracing::info!(
            "  ANTHROPIC_BASE_URL: {}",
            self.anthropic_base_url.as_deref().unwrap_or("<not set>")
        );
    }
}
