//! Backend Error Types
//!
//! Transport-agnostic error taxonomy for backend operations. These types are
//! dependency-free (thiserror + serde_json + std) so every workspace crate can
//! share them without pulling in the HTTP stack.
//!
//! The taxonomy follows three tiers: transient errors (network, HTTP status,
//! malformed payloads) that callers surface with a retry affordance, contract
//! errors (`PlanNotFound`, `AlreadyApproved`) that must fail fast, and
//! serialization errors from the wire layer.

use thiserror::Error;

/// Error type for all planning-backend operations.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Client configuration errors (invalid base URL, missing settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-success HTTP response with status and response body
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Transport-level failures (DNS, connect, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Response arrived but did not match the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Approval requested for a cycle with no draft plan
    #[error("No draft plan for cycle: {0}")]
    PlanNotFound(String),

    /// Approval requested for a cycle that was already approved
    #[error("Plan already approved for cycle: {0}")]
    AlreadyApproved(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

impl BackendError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create an invalid-response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Whether the caller should offer a retry for this error.
    ///
    /// Contract errors (`PlanNotFound`, `AlreadyApproved`) are not retryable:
    /// repeating the call cannot succeed and indicates a logic inconsistency.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::Http { .. }
                | BackendError::Network(_)
                | BackendError::InvalidResponse(_)
        )
    }
}

/// Convert BackendError to a string suitable for inline UI surfacing
impl From<BackendError> for String {
    fn from(err: BackendError) -> String {
        err.to_string()
    }
}
