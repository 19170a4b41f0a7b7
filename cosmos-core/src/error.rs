//! Error types for the cosmos-core crate.

use thiserror::Error;

/// Top-level error type for logging and sync operations.
#[derive(Debug, Error)]
pub enum CosmosError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("Too many metric values: got {values} values for {keys} keys")]
    KeyMismatch { values: usize, keys: usize },

    #[error("Corrupt metric log: {0}")]
    CorruptLog(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl CosmosError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn corrupt_log(msg: impl Into<String>) -> Self {
        Self::CorruptLog(msg.into())
    }

    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }
}
