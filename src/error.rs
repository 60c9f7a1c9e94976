//! Error types for Recall

use thiserror::Error;

/// Result type alias for Recall operations
pub type Result<T> = std::result::Result<T, RecallError>;

/// Main error type for Recall
///
/// Every operation-level failure is one of these variants and is returned
/// as data at the tool boundary. Nothing here terminates the serving process.
#[derive(Error, Debug)]
pub enum RecallError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Missing identity: {0} not provided")]
    MissingIdentity(&'static str),

    #[error("App {app} is currently paused. Cannot create new memories.")]
    InactiveApp { app: String },

    #[error("Input text too long ({len} chars). Maximum allowed: {max} chars.")]
    InputTooLong { len: usize, max: usize },

    #[error("Memory backend is currently unavailable. Please try again later.")]
    BackendUnavailable,

    #[error("Memory operation timed out after {elapsed_secs:.2}s. The backend may be slow or unavailable.")]
    Timeout { elapsed_secs: f64 },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Session '{session}' has expired or is invalid. Please reconnect.")]
    SessionExpired { session: String },

    #[error("No accessible memories found with provided IDs")]
    NotFoundOrInaccessible,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RecallError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RecallError::BackendUnavailable | RecallError::Timeout { .. } | RecallError::Backend(_)
        )
    }

    /// Get error code for MCP protocol
    pub fn code(&self) -> i64 {
        match self {
            RecallError::NotFoundOrInaccessible => -32001,
            RecallError::SessionExpired { .. } => -32002,
            RecallError::MissingIdentity(_) => -32003,
            RecallError::InactiveApp { .. } => -32004,
            RecallError::Timeout { .. } => -32005,
            RecallError::BackendUnavailable => -32006,
            RecallError::InputTooLong { .. } => -32602,
            RecallError::InvalidInput(_) => -32602,
            _ => -32000,
        }
    }
}
