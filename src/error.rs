//! Error types for Ghostwriter
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur while executing a chain
#[derive(Debug, Error)]
pub enum GhostwriterError {
    /// Request carried no usable user input
    #[error("user_input must not be empty")]
    EmptyInput,

    /// Conversation or persona identifier failed sanitization
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Projected chain cost is over the configured cap
    #[error("projected cost ${projected:.6} exceeds budget ${cap:.6}")]
    BudgetExceeded { projected: f64, cap: f64 },

    /// Model has no entry in the pricing table
    #[error("no pricing configured for model: {0}")]
    UnknownModel(String),

    /// LLM client call failed
    #[error("LLM error: {0}")]
    Llm(String),

    /// State file locking/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Ghostwriter operations
pub type Result<T> = std::result::Result<T, GhostwriterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_error() {
        let err = GhostwriterError::EmptyInput;
        assert_eq!(err.to_string(), "user_input must not be empty");
    }

    #[test]
    fn test_invalid_id_error() {
        let err = GhostwriterError::InvalidId("../etc".to_string());
        assert_eq!(err.to_string(), "invalid identifier: ../etc");
    }

    #[test]
    fn test_budget_exceeded_message_contains_marker() {
        let err = GhostwriterError::BudgetExceeded {
            projected: 0.004217,
            cap: 0.001,
        };
        let message = err.to_string();
        assert!(message.contains("exceeds budget"));
        assert!(message.contains("0.004217"));
        assert!(message.contains("0.001000"));
    }

    #[test]
    fn test_unknown_model_error() {
        let err = GhostwriterError::UnknownModel("gpt-99".to_string());
        assert_eq!(err.to_string(), "no pricing configured for model: gpt-99");
    }

    #[test]
    fn test_llm_error() {
        let err = GhostwriterError::Llm("rate limited".to_string());
        assert_eq!(err.to_string(), "LLM error: rate limited");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GhostwriterError = io_err.into();
        assert!(matches!(err, GhostwriterError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: GhostwriterError = json_err.into();
        assert!(matches!(err, GhostwriterError::Json(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(GhostwriterError::EmptyInput)
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }
}
