//! Error types for Daesa.

use crate::tasks::TaskFailure;
use std::time::Duration;
use thiserror::Error;

/// Library-level error type for Daesa operations.
#[derive(Error, Debug)]
pub enum DaesaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Index store error: {0}")]
    IndexStore(String),

    #[error("Index store client is closed")]
    StoreClosed,

    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    #[error("Timed out after {0:?} waiting for the search task")]
    WaitTimeout(Duration),

    #[error("Search task failed: {0}")]
    Task(#[from] TaskFailure),

    #[error("Task queue is shut down")]
    QueueClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DaesaError {
    /// Whether the failure came from an unreachable or misbehaving backend
    /// (index store or embedding service) rather than from the caller.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DaesaError::Embedding(_)
                | DaesaError::IndexStore(_)
                | DaesaError::Database(_)
                | DaesaError::Http(_)
                | DaesaError::OpenAI(_)
        )
    }
}

/// Result type alias for Daesa operations.
pub type Result<T> = std::result::Result<T, DaesaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DaesaError::Embedding("down".to_string()).is_transient());
        assert!(DaesaError::IndexStore("refused".to_string()).is_transient());
        assert!(!DaesaError::MalformedQuery("empty".to_string()).is_transient());
        assert!(!DaesaError::WaitTimeout(Duration::from_secs(50)).is_transient());
    }
}
