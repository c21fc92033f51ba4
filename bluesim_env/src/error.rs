//! Error types for the BlueSim environment abstraction.

use crate::types::FishId;
use thiserror::Error;

/// Errors that can occur at the environment boundary.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Fish id outside the fixed population
    #[error("Unknown fish: {0}")]
    UnknownFish(FishId),

    /// Configuration value rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Driver task failed (panicked or was cancelled)
    #[error("Context error: {0}")]
    ContextError(String),

    /// Reading or writing a file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config or export (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EnvError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Creates a context error.
    pub fn context(msg: impl std::fmt::Display) -> Self {
        Self::ContextError(msg.to_string())
    }

    /// Creates a serialization error.
    pub fn serialization(msg: impl std::fmt::Display) -> Self {
        Self::Serialization(msg.to_string())
    }
}
