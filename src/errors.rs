//! Error types for OnboardBuddy
//!
//! The context core (token accounting and compression) is total and never
//! returns these; they cover the fallible edges: configuration, tokenizer
//! loading and session storage.

use thiserror::Error;

/// Main error type for the OnboardBuddy memory system
#[derive(Error, Debug)]
pub enum AgentError {
    /// Tokenizer loading or encoding errors
    #[error("Tokenizer error: {0}")]
    TokenizerError(String),

    /// Session lookup errors
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Session store backend errors
    #[error("Session store error: {0}")]
    StoreError(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic errors with context
    #[error("Agent error: {0}")]
    Generic(String),
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Convert anyhow errors to AgentError
impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Generic(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::SessionNotFound("abc-123".to_string());
        assert!(err.to_string().contains("abc-123"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AgentError = io.into();
        assert!(matches!(err, AgentError::IoError(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: AgentError = anyhow::anyhow!("boom").into();
        assert!(err.to_string().contains("boom"));
    }
}
