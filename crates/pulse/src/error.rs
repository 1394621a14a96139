//! Error types for Pulse

use thiserror::Error;

/// Main error type for Pulse operations
#[derive(Error, Debug)]
pub enum PulseError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend construction errors (HTTP client setup, invalid endpoints)
    #[error("Backend error: {0}")]
    Backend(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),
}

impl From<crate::gateway::BackendError> for PulseError {
    fn from(e: crate::gateway::BackendError) -> Self {
        PulseError::Backend(e.to_string())
    }
}

/// Result type alias for Pulse operations
pub type Result<T> = std::result::Result<T, PulseError>;
