pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::{load_config, AppConfig, EngineConfig, FileConfig, ModelsConfig, RetryConfig};
pub use error::{EngineError, OracleError};
pub use events::ArenaEvent;
pub use types::*;
