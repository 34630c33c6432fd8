//! Shared utilities that glue the pipeline stages together.
pub mod config;
pub mod error;
pub mod ids;
pub mod layout;
pub mod log;
pub mod time;

pub use config::{load_config, Config, ConfigError};
pub use error::{ErrorCode, PipelineError, PipelineResult, ResultExt};
pub use layout::ProjectLayout;
