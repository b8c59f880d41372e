//! Planning Backend Trait
//!
//! The seam between the orchestration state machines and the transport that
//! reaches the UAT backend. The `uat-pilot-api` crate provides the REST
//! implementation; tests substitute in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::blocker::{Blocker, BlockerAction, BlockerConfig, BlockerType, ConnectionTestResult};
use crate::error::BackendResult;
use crate::plan::{ApprovalReceipt, ModificationType, TestPlan, TriggerResponse};
use crate::progress::ProgressStats;

/// Result of blocker detection for a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockerDetection {
    /// Count of detected blockers (mirrors `blockers.len()` on a well-formed
    /// response; kept separate because the wire carries both)
    pub blockers_detected: u32,
    #[serde(default)]
    pub blockers: Vec<Blocker>,
    pub summary: String,
}

/// Acknowledgement of a per-blocker action submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondAck {
    pub status: String,
    pub message: String,
}

/// Operations the UAT backend exposes to the planning core.
///
/// Every call blocks its owning state transition until resolved; callers
/// surface failures inline and keep their state machine in place.
#[async_trait]
pub trait PlanningBackend: Send + Sync {
    /// Inspect a project for environmental blockers.
    async fn detect_blockers(
        &self,
        project_name: &str,
        project_path: &str,
    ) -> BackendResult<BlockerDetection>;

    /// Record the user's chosen action for one blocker.
    async fn respond_blocker(
        &self,
        blocker_id: &str,
        action: BlockerAction,
        project_name: &str,
    ) -> BackendResult<RespondAck>;

    /// Probe live connectivity for a `wait` resolution.
    async fn test_connection(
        &self,
        blocker_type: BlockerType,
        service: &str,
    ) -> BackendResult<ConnectionTestResult>;

    /// Generate a draft test plan. Not guaranteed deterministic; callers
    /// treat the output as a proposal.
    async fn generate_plan(
        &self,
        project_name: &str,
        blocker_config: &BlockerConfig,
    ) -> BackendResult<TestPlan>;

    /// Regenerate the draft for a cycle from a modification request.
    /// The response replaces the prior draft wholesale.
    async fn modify_plan(
        &self,
        project_name: &str,
        cycle_id: &str,
        modification_type: ModificationType,
        user_message: &str,
    ) -> BackendResult<TestPlan>;

    /// Materialize the current draft into persisted test records.
    /// At most once per cycle: fails with `PlanNotFound` or `AlreadyApproved`.
    async fn approve_plan(&self, cycle_id: &str) -> BackendResult<ApprovalReceipt>;

    /// Start execution of the approved cycle.
    async fn trigger_execution(&self, project_name: &str) -> BackendResult<TriggerResponse>;

    /// One-shot progress snapshot. Used only to seed state before the
    /// progress stream is live, never polled alongside it.
    async fn get_progress(&self, cycle_id: &str) -> BackendResult<ProgressStats>;
}
