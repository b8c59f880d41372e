//! Progress Stream Wire Protocol
//!
//! Message envelope and payload types for the per-cycle duplex channel.
//! Server messages travel as `{type, data, seq?}`; the adjacently tagged
//! serde representation maps `type`/`data` directly onto that contract.
//! `seq` is an optional monotonic counter the client uses to discard
//! messages replayed or reordered across reconnects.

use serde::{Deserialize, Serialize};

use crate::plan::TestPhase;

// ---------------------------------------------------------------------------
// Aggregate stats
// ---------------------------------------------------------------------------

/// Aggregate cycle statistics. Always replaces the last-known snapshot
/// (last-write-wins; never merged).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressStats {
    pub total_tests: u32,
    pub passed: u32,
    pub failed: u32,
    pub running: u32,
    pub pending: u32,
    pub active_agents: u32,
}

impl ProgressStats {
    /// Number of tests that reached a terminal result.
    pub fn completed(&self) -> u32 {
        self.passed + self.failed
    }
}

// ---------------------------------------------------------------------------
// Event payloads
// ---------------------------------------------------------------------------

/// Payload for per-test lifecycle messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestEvent {
    pub test_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<TestPhase>,
    /// Failure detail for `test_failed`, otherwise absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Payload for agent lifecycle messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentEvent {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Payload for the terminal `cycle_complete` message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ProgressStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Server→client message body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message on a live channel; the channel is `connecting` until
    /// this arrives.
    Connected { cycle_id: String },
    TestStarted(TestEvent),
    TestPassed(TestEvent),
    TestFailed(TestEvent),
    AgentStarted(AgentEvent),
    AgentStopped(AgentEvent),
    ProgressStats(ProgressStats),
    /// Terminal: no further events follow for this cycle.
    CycleComplete(CycleOutcome),
    /// Informational; never closes the channel.
    Error { message: String },
    Pong,
}

impl ServerMessage {
    /// Whether applying this message mutates client-visible cycle state.
    /// Only such messages are subject to the sequence guard.
    pub fn is_state_mutating(&self) -> bool {
        !matches!(self, ServerMessage::Pong | ServerMessage::Error { .. })
    }
}

/// Full wire envelope: the tagged message plus the optional sequence number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(flatten)]
    pub message: ServerMessage,
}

impl StreamEnvelope {
    pub fn new(message: ServerMessage) -> Self {
        Self { seq: None, message }
    }

    pub fn with_seq(seq: u64, message: ServerMessage) -> Self {
        Self {
            seq: Some(seq),
            message,
        }
    }
}

/// Client→server messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    RequestStats,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
