//! Error types shared across Helideck crates.

use thiserror::Error;

/// Top-level error for Helideck.
#[derive(Debug, Error)]
pub enum HelideckError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid severity: {0}")]
    InvalidSeverity(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for HelideckError {
    fn from(e: serde_json::Error) -> Self {
        HelideckError::Serialization(e.to_string())
    }
}

impl From<rusqlite::Error> for HelideckError {
    fn from(e: rusqlite::Error) -> Self {
        HelideckError::Storage(e.to_string())
    }
}

/// Result alias using [`HelideckError`].
pub type Result<T> = std::result::Result<T, HelideckError>;
