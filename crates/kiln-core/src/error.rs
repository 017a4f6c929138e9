//! Error types for kiln.

use crate::build::BuildStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Submission errors
    #[error("Invalid build configuration: {0}")]
    InvalidConfig(String),

    // Build errors
    #[error("Invalid build status transition from {from} to {to}")]
    InvalidTransition { from: BuildStatus, to: BuildStatus },

    // Infrastructure errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Event bus error: {0}")]
    EventBus(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
