//! Error taxonomy for generation sessions
//!
//! Fail-fast errors are raised before any network call. Everything else is
//! terminal for the session but never retracts records already delivered.

use thiserror::Error;

use crate::emit::SinkWarning;
use crate::types::GenerationResult;

/// Why a generation session failed
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Prompt or request parameters rejected before any network activity
    #[error("invalid request: {0}")]
    Validation(String),

    /// No authenticated identity available
    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    /// Backend endpoint is not configured
    #[error("generation endpoint is not configured")]
    NotConfigured,

    /// Transport-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Non-success response or explicit error frame from the backend
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Event framing that cannot be resynchronized
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// No chunk arrived within the inactivity bound
    #[error("no data received for {0:?}")]
    Timeout(std::time::Duration),

    /// Payload index does not match the locally tracked sequence
    #[error("protocol violation: expected card #{expected}, backend sent #{received}")]
    ProtocolViolation { expected: usize, received: usize },

    /// Caller cancelled the session
    #[error("generation cancelled")]
    Cancelled,
}

impl GenerationError {
    /// Errors raised before any network call; never worth retrying as-is
    pub fn is_fail_fast(&self) -> bool {
        matches!(
            self,
            GenerationError::Validation(_)
                | GenerationError::AuthenticationRequired(_)
                | GenerationError::NotConfigured
        )
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        GenerationError::Network(err.to_string())
    }
}

/// Terminal failure of a session, carrying whatever was delivered before it
#[derive(Debug, Error)]
#[error("{error}")]
pub struct SessionFailure {
    #[source]
    pub error: GenerationError,
    /// Records (and title) already delivered to the sink before the failure
    pub partial: GenerationResult,
    /// Sink failures collected while streaming
    pub sink_warnings: Vec<SinkWarning>,
}

impl SessionFailure {
    pub(crate) fn before_network(error: GenerationError) -> Self {
        Self {
            error,
            partial: GenerationResult::default(),
            sink_warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_fast_classification() {
        assert!(GenerationError::Validation("x".into()).is_fail_fast());
        assert!(GenerationError::AuthenticationRequired("x".into()).is_fail_fast());
        assert!(GenerationError::NotConfigured.is_fail_fast());
        assert!(!GenerationError::Upstream("x".into()).is_fail_fast());
        assert!(!GenerationError::Timeout(std::time::Duration::from_secs(1)).is_fail_fast());
        assert!(!GenerationError::ProtocolViolation {
            expected: 0,
            received: 1
        }
        .is_fail_fast());
    }

    #[test]
    fn test_failure_displays_inner_error() {
        let failure = SessionFailure::before_network(GenerationError::NotConfigured);
        assert_eq!(failure.to_string(), "generation endpoint is not configured");
        assert!(failure.partial.cards.is_empty());
    }
}
