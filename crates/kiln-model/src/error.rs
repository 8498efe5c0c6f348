use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown build target: {0}")]
    UnknownTarget(String),

    #[error("invalid flag value: {0}")]
    InvalidFlag(String),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("invalid config value for {key}: {reason}")]
    InvalidConfig { key: &'static str, reason: String },

    #[error("failed to read config file {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type ModelResult<T> = Result<T, ModelError>;
