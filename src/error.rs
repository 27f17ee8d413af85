//! Error types for the GNAT index

use thiserror::Error;

/// Result type alias for GNAT operations
pub type Result<T> = std::result::Result<T, GnatError>;

/// Error types that can occur in GNAT operations
#[derive(Error, Debug)]
pub enum GnatError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GnatError {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        GnatError::InvalidInput {
            reason: reason.into(),
        }
    }
}
