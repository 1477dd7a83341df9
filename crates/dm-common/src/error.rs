//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, DmError>;

/// Main error type for shared functionality
#[derive(Error, Debug)]
pub enum DmError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid export file {path}: {reason}")]
    InvalidExportFile { path: String, reason: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl DmError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an invalid endpoint error
    pub fn invalid_endpoint(msg: impl Into<String>) -> Self {
        Self::InvalidEndpoint(msg.into())
    }
}
