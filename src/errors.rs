// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::model::BatchResults;

#[derive(Error, Debug)]
pub enum TaskforkError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to spawn worker process for '{label}': {source}")]
    Spawn {
        label: String,
        source: std::io::Error,
    },

    /// The batch worker died before reporting completion. `results` holds a
    /// failed entry for every root task of the batch.
    #[error("\"{executor}\" exited unexpectedly with code: {code}")]
    BatchExited {
        executor: String,
        code: i32,
        results: BatchResults,
    },

    #[error("\"{executor}\" exited without reporting batch results")]
    BatchIncomplete { executor: String },

    #[error("Control channel error: {0}")]
    ControlChannel(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskforkError>;
