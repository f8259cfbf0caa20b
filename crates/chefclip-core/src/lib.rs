//! Shared configuration and core types for the chefclip workspace.

use thiserror::Error;

mod app_config;
mod config;
mod prompt;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use prompt::{load_prompt_config, PromptConfig};

/// Errors raised while loading process configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read prompt config at {path}: {source}")]
    PromptIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse prompt config at {path}: {source}")]
    PromptParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
