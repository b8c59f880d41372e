//! Blocker Types
//!
//! Types for environmental blockers detected before a UAT cycle: the blocker
//! record itself, the action a user picks per blocker, the connection-probe
//! result, and the resolved configuration handed to plan generation.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Blocker classification
// ---------------------------------------------------------------------------

/// Category of environmental precondition that can block safe test execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BlockerType {
    EmailVerification,
    Sms,
    PaymentGateway,
    ExternalApi,
    DatabaseMigration,
    AuthProvider,
}

impl BlockerType {
    /// The service label used when probing connectivity for this blocker.
    ///
    /// Probes are keyed by `(blocker_type, service)`; the blocker record
    /// carries no service field, so the label is derived here.
    pub fn probe_service(&self) -> &'static str {
        match self {
            BlockerType::EmailVerification => "smtp",
            BlockerType::Sms => "sms_gateway",
            BlockerType::PaymentGateway => "payment_gateway",
            BlockerType::ExternalApi => "external_api",
            BlockerType::DatabaseMigration => "database",
            BlockerType::AuthProvider => "auth_provider",
        }
    }
}

impl fmt::Display for BlockerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockerType::EmailVerification => write!(f, "email_verification"),
            BlockerType::Sms => write!(f, "sms"),
            BlockerType::PaymentGateway => write!(f, "payment_gateway"),
            BlockerType::ExternalApi => write!(f, "external_api"),
            BlockerType::DatabaseMigration => write!(f, "database_migration"),
            BlockerType::AuthProvider => write!(f, "auth_provider"),
        }
    }
}

/// Resolution a user picks for a single blocker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockerAction {
    /// Keep the dependency live; requires a successful connection probe
    Wait,
    /// Skip the affected tests for this cycle
    Skip,
    /// Run the affected tests against a mocked dependency
    Mock,
}

impl fmt::Display for BlockerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockerAction::Wait => write!(f, "wait"),
            BlockerAction::Skip => write!(f, "skip"),
            BlockerAction::Mock => write!(f, "mock"),
        }
    }
}

// ---------------------------------------------------------------------------
// Blocker record
// ---------------------------------------------------------------------------

/// An environmental precondition detected before execution.
///
/// `action` starts empty and is committed exactly once by the negotiator;
/// it is immutable thereafter for the rest of the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blocker {
    pub id: String,
    pub blocker_type: BlockerType,
    pub detected: bool,
    pub reason: String,
    #[serde(default)]
    pub affected_tests: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub action: Option<BlockerAction>,
}

impl Blocker {
    /// Create a detected blocker with no action chosen yet.
    pub fn detected(id: impl Into<String>, blocker_type: BlockerType, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            blocker_type,
            detected: true,
            reason: reason.into(),
            affected_tests: Vec::new(),
            notes: None,
            action: None,
        }
    }
}

/// Result of a single connectivity probe. Ephemeral: superseded by each retry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionTestResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

impl ConnectionTestResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            details: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            details: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// One fully negotiated blocker: the committed action plus probe evidence
/// for `wait` resolutions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockerResolution {
    pub blocker_id: String,
    pub blocker_type: BlockerType,
    pub action: BlockerAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<ConnectionTestResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// The full set of negotiated resolutions handed to plan generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockerConfig {
    pub resolutions: Vec<BlockerResolution>,
}

impl BlockerConfig {
    pub fn is_empty(&self) -> bool {
        self.resolutions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.resolutions.len()
    }

    /// Look up the committed action for a blocker id.
    pub fn action_for(&self, blocker_id: &str) -> Option<BlockerAction> {
        self.resolutions
            .iter()
            .find(|r| r.blocker_id == blocker_id)
            .map(|r| r.action)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
