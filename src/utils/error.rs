//! Error Handling
//!
//! Unified error types for the application.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::services::blocker::NegotiationError;
use crate::services::context::StoreError;
use crate::services::execution::ExecutionError;
use crate::services::plan::PlanSessionError;
use uat_pilot_core::BackendError;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Backend transport/contract errors
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Project store errors
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Blocker negotiation errors
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    /// Plan session errors
    #[error(transparent)]
    PlanSession(#[from] PlanSessionError),

    /// Execution trigger errors
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Progress stream errors
    #[error("Stream error: {0}")]
    Stream(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Convert AppError to a string suitable for inline UI surfacing
impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}
