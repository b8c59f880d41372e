//! Execution Trigger
//!
//! Starts a cycle for an approved plan. Execution itself is owned by the
//! backend; only the response contract is consumed here.

use thiserror::Error;

use uat_pilot_core::backend::PlanningBackend;
use uat_pilot_core::{BackendError, TriggerResponse};

use crate::services::plan::{PlanSession, PlanStage};

/// Errors from triggering execution.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Plan must be approved before triggering execution (stage: '{0}')")]
    NotApproved(PlanStage),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Triggers execution of an approved cycle.
pub struct ExecutionLauncher;

impl ExecutionLauncher {
    /// Start the cycle for a confirmed session. Returns the execution mode
    /// and initial agent count; live progress then flows over the stream
    /// channel, not this endpoint.
    pub async fn start(
        backend: &dyn PlanningBackend,
        session: &PlanSession,
    ) -> Result<TriggerResponse, ExecutionError> {
        if session.stage() != PlanStage::Confirmed {
            return Err(ExecutionError::NotApproved(session.stage()));
        }

        let response = backend.trigger_execution(session.project_name()).await?;
        tracing::debug!(
            "cycle {} triggered: {} agents, {} mode",
            response.cycle_id,
            response.agents_spawned,
            response.execution_mode
        );
        Ok(response)
    }
}
