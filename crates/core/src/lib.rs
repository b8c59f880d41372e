//! UAT Pilot Core
//!
//! Protocol types, the planning-backend trait seam, and the error taxonomy
//! for the UAT Pilot workspace. This crate has zero dependencies on
//! application-level code (HTTP stack, WebSocket transport, state machines).
//!
//! ## Module Organization
//!
//! - `error` - Backend error taxonomy (`BackendError`, `BackendResult`)
//! - `blocker` - Blocker records, actions, probe results, resolved config
//! - `plan` - Test plan drafts, scenarios, modification/approval contracts
//! - `progress` - Progress-stream wire protocol (envelope + payloads)
//! - `backend` - `PlanningBackend` trait implemented by the transport crate
//! - `proxy` - Proxy configuration shared with the HTTP client factory
//!
//! ## Design Principles
//!
//! 1. **Zero external dependencies beyond serde/async-trait/thiserror**
//! 2. **Trait-based abstractions** - enables fakes in tests and alternate transports
//! 3. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod backend;
pub mod blocker;
pub mod error;
pub mod plan;
pub mod progress;
pub mod proxy;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{BackendError, BackendResult};

// ── Blocker Types ──────────────────────────────────────────────────────
pub use blocker::{
    Blocker, BlockerAction, BlockerConfig, BlockerResolution, BlockerType, ConnectionTestResult,
};

// ── Plan Types ─────────────────────────────────────────────────────────
pub use plan::{
    ApprovalReceipt, ExecutionMode, JourneyProposal, ModificationType, PhaseProposal, TestPhase,
    TestPlan, TestPriority, TestScenario, TriggerResponse,
};

// ── Progress Protocol ──────────────────────────────────────────────────
pub use progress::{
    AgentEvent, ClientMessage, CycleOutcome, ProgressStats, ServerMessage, StreamEnvelope,
    TestEvent,
};

// ── Backend Trait ──────────────────────────────────────────────────────
pub use backend::{BlockerDetection, PlanningBackend, RespondAck};

// ── Proxy Types ────────────────────────────────────────────────────────
pub use proxy::{ProxyConfig, ProxyProtocol};
