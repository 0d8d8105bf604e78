//! Error types for nlq-bridge.
//!
//! Every failure a request can hit maps onto one variant of [`BridgeError`].
//! The orchestrator converts them into renderable outcomes, so none of these
//! ever reach the caller as a raw fault.

use std::time::Duration;
use thiserror::Error;

/// Main error type for query orchestration.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The generator answered outside the closed intent set.
    #[error("Could not classify the instruction (generator answered {raw:?})")]
    ClassificationAmbiguous { raw: String },

    /// Structured generator output could not be parsed.
    #[error("Could not parse the generated query: {0}")]
    SynthesisParse(String),

    /// The synthesized query does not match the classified intent.
    #[error("Generated query was rejected: {0}")]
    Validation(String),

    /// The backend rejected or failed the operation.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// The pipeline exceeded its wall-clock budget.
    #[error("Query timed out after {} seconds", .0.as_secs())]
    TimedOut(Duration),

    /// Backend connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Generation service errors (rate limits, auth, transport).
    #[error("LLM error: {0}")]
    Llm(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Copyable discriminant of [`BridgeError`], carried by failed outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ClassificationAmbiguous,
    SynthesisParse,
    Validation,
    Execution,
    TimedOut,
    Connection,
    Llm,
    Config,
    Internal,
}

impl BridgeError {
    /// Creates a classification error carrying the raw generator output.
    pub fn ambiguous(raw: impl Into<String>) -> Self {
        Self::ClassificationAmbiguous { raw: raw.into() }
    }

    /// Creates a synthesis parse error with the given message.
    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::SynthesisParse(msg.into())
    }

    /// Creates a validation error with the given message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates an LLM error with the given message.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the discriminant of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ClassificationAmbiguous { .. } => ErrorKind::ClassificationAmbiguous,
            Self::SynthesisParse(_) => ErrorKind::SynthesisParse,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Execution(_) => ErrorKind::Execution,
            Self::TimedOut(_) => ErrorKind::TimedOut,
            Self::Connection(_) => ErrorKind::Connection,
            Self::Llm(_) => ErrorKind::Llm,
            Self::Config(_) => ErrorKind::Config,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ClassificationAmbiguous { .. } => "Classification Error",
            Self::SynthesisParse(_) => "Synthesis Error",
            Self::Validation(_) => "Validation Error",
            Self::Execution(_) => "Execution Error",
            Self::TimedOut(_) => "Timeout",
            Self::Connection(_) => "Connection Error",
            Self::Llm(_) => "LLM Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Human-readable sentence shown in place of a result.
    pub fn user_message(&self) -> String {
        match self {
            Self::TimedOut(_) => {
                "Query took too long and was canceled. Try a simpler or more specific question."
                    .to_string()
            }
            other => format!("An error occurred: {other}"),
        }
    }
}

/// Result type alias using BridgeError.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_ambiguous() {
        let err = BridgeError::ambiguous("maybe a select?");
        assert_eq!(
            err.to_string(),
            "Could not classify the instruction (generator answered \"maybe a select?\")"
        );
        assert_eq!(err.kind(), ErrorKind::ClassificationAmbiguous);
        assert_eq!(err.category(), "Classification Error");
    }

    #[test]
    fn test_error_display_validation() {
        let err = BridgeError::validation("only INSERT, UPDATE, DELETE are allowed");
        assert_eq!(
            err.to_string(),
            "Generated query was rejected: only INSERT, UPDATE, DELETE are allowed"
        );
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_error_display_timeout() {
        let err = BridgeError::TimedOut(Duration::from_secs(30));
        assert_eq!(err.to_string(), "Query timed out after 30 seconds");
        assert_eq!(err.category(), "Timeout");
    }

    #[test]
    fn test_user_message_for_timeout() {
        let err = BridgeError::TimedOut(Duration::from_secs(5));
        assert_eq!(
            err.user_message(),
            "Query took too long and was canceled. Try a simpler or more specific question."
        );
    }

    #[test]
    fn test_user_message_for_execution() {
        let err = BridgeError::execution("Duplicate entry '1' for key 'PRIMARY'");
        assert_eq!(
            err.user_message(),
            "An error occurred: Execution failed: Duplicate entry '1' for key 'PRIMARY'"
        );
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BridgeError>();
    }
}
