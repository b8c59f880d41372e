//! Plan Session State Machine
//!
//! Drives the conversational generate/modify/approve flow for one planning
//! session: `Gathering -> Ready -> Generating -> Proposal <->
//! ConfirmingRejection -> Proposal | Confirmed`, with `Approving` as the
//! explicit pending stage while the approval call is in flight.
//!
//! Drafts are replaced wholesale; only the immediately prior draft is kept,
//! and only for the cancel-rejection rollback. Every generate/modify call is
//! tagged with a request token, and a completing response whose token is not
//! the latest outstanding one is discarded without touching the draft.

use std::fmt;

use thiserror::Error;

use uat_pilot_core::backend::PlanningBackend;
use uat_pilot_core::{ApprovalReceipt, BackendError, BlockerConfig, ModificationType, TestPlan};

use crate::models::context::ProjectContext;

use super::classifier::classify_modification;
use super::dependency::{DependencyError, DependencyValidator, ScenarioBatch};

// ---------------------------------------------------------------------------
// Stages & errors
// ---------------------------------------------------------------------------

/// Stage of the conversational plan flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStage {
    /// Collecting context and blocker resolutions
    Gathering,
    /// Ready to generate the first draft
    Ready,
    /// Generate/modify call in flight
    Generating,
    /// A draft is on display, awaiting approval or rejection
    Proposal,
    /// Rejection feedback being collected
    ConfirmingRejection,
    /// Approval call in flight
    Approving,
    /// Plan approved and materialized; immutable
    Confirmed,
}

impl fmt::Display for PlanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStage::Gathering => write!(f, "gathering"),
            PlanStage::Ready => write!(f, "ready"),
            PlanStage::Generating => write!(f, "generating"),
            PlanStage::Proposal => write!(f, "proposal"),
            PlanStage::ConfirmingRejection => write!(f, "confirming_rejection"),
            PlanStage::Approving => write!(f, "approving"),
            PlanStage::Confirmed => write!(f, "confirmed"),
        }
    }
}

/// Errors from the plan session state machine.
#[derive(Debug, Error)]
pub enum PlanSessionError {
    #[error("Operation '{operation}' is not valid in stage '{stage}'")]
    InvalidStage {
        stage: PlanStage,
        operation: &'static str,
    },

    #[error("No draft plan for this session")]
    NoDraft,

    #[error("Draft rejected: {0}")]
    InvalidPlan(#[from] DependencyError),

    #[error("Response superseded by a newer request")]
    Superseded,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One conversational planning session.
///
/// Transitions are exclusive (`&mut self`); the `Generating`/`Approving`
/// stages are the pending gate that rejects overlapping operations.
pub struct PlanSession {
    project_name: String,
    stage: PlanStage,
    context: Option<ProjectContext>,
    blocker_config: Option<BlockerConfig>,
    cycle_id: Option<String>,
    draft: Option<TestPlan>,
    batches: Vec<ScenarioBatch>,
    /// The draft replaced by the last modification, kept one deep for the
    /// cancel-rejection rollback display
    prior_draft: Option<TestPlan>,
    approval: Option<ApprovalReceipt>,
    request_seq: u64,
}

impl PlanSession {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            stage: PlanStage::Gathering,
            context: None,
            blocker_config: None,
            cycle_id: None,
            draft: None,
            batches: Vec::new(),
            prior_draft: None,
            approval: None,
            request_seq: 0,
        }
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn stage(&self) -> PlanStage {
        self.stage
    }

    pub fn cycle_id(&self) -> Option<&str> {
        self.cycle_id.as_deref()
    }

    pub fn context(&self) -> Option<&ProjectContext> {
        self.context.as_ref()
    }

    pub fn draft(&self) -> Option<&TestPlan> {
        self.draft.as_ref()
    }

    pub fn prior_draft(&self) -> Option<&TestPlan> {
        self.prior_draft.as_ref()
    }

    /// Execution batches derived from the current draft's dependency DAG.
    pub fn batches(&self) -> &[ScenarioBatch] {
        &self.batches
    }

    pub fn approval(&self) -> Option<&ApprovalReceipt> {
        self.approval.as_ref()
    }

    /// Record the readiness snapshot while gathering.
    pub fn attach_context(&mut self, context: ProjectContext) -> Result<(), PlanSessionError> {
        if self.stage != PlanStage::Gathering {
            return Err(PlanSessionError::InvalidStage {
                stage: self.stage,
                operation: "attach_context",
            });
        }
        self.context = Some(context);
        Ok(())
    }

    /// Finish gathering: record the negotiated blocker configuration and
    /// become ready to generate.
    pub fn mark_ready(&mut self, blocker_config: BlockerConfig) -> Result<(), PlanSessionError> {
        if self.stage != PlanStage::Gathering {
            return Err(PlanSessionError::InvalidStage {
                stage: self.stage,
                operation: "mark_ready",
            });
        }
        self.blocker_config = Some(blocker_config);
        self.stage = PlanStage::Ready;
        Ok(())
    }

    /// Generate the initial draft. Output is a proposal: generation is not
    /// deterministic and repeated calls may differ.
    pub async fn generate(
        &mut self,
        backend: &dyn PlanningBackend,
    ) -> Result<&TestPlan, PlanSessionError> {
        if self.stage != PlanStage::Ready {
            return Err(PlanSessionError::InvalidStage {
                stage: self.stage,
                operation: "generate",
            });
        }

        let config = self.blocker_config.clone().unwrap_or_default();
        self.stage = PlanStage::Generating;
        let token = self.begin_request();

        match backend.generate_plan(&self.project_name, &config).await {
            Ok(plan) => match self.accept_draft(token, plan) {
                Ok(()) => self.draft.as_ref().ok_or(PlanSessionError::NoDraft),
                Err(e) => {
                    if !matches!(e, PlanSessionError::Superseded) {
                        self.stage = PlanStage::Ready;
                    }
                    Err(e)
                }
            },
            Err(e) => {
                // Transient: stay retryable from Ready.
                self.stage = PlanStage::Ready;
                Err(PlanSessionError::Backend(e))
            }
        }
    }

    /// Reject the current proposal and start collecting feedback.
    pub fn reject(&mut self) -> Result<(), PlanSessionError> {
        if self.stage != PlanStage::Proposal {
            return Err(PlanSessionError::InvalidStage {
                stage: self.stage,
                operation: "reject",
            });
        }
        self.stage = PlanStage::ConfirmingRejection;
        Ok(())
    }

    /// Abandon the rejection and return to the unchanged proposal.
    pub fn cancel_rejection(&mut self) -> Result<(), PlanSessionError> {
        if self.stage != PlanStage::ConfirmingRejection {
            return Err(PlanSessionError::InvalidStage {
                stage: self.stage,
                operation: "cancel_rejection",
            });
        }
        self.stage = PlanStage::Proposal;
        Ok(())
    }

    /// Submit rejection feedback: classifies the request (an explicitly
    /// supplied type overrides the keyword inference) and regenerates the
    /// draft. The response replaces the prior draft wholesale.
    pub async fn submit_feedback(
        &mut self,
        backend: &dyn PlanningBackend,
        user_message: &str,
        explicit_type: Option<ModificationType>,
    ) -> Result<&TestPlan, PlanSessionError> {
        if self.stage != PlanStage::ConfirmingRejection {
            return Err(PlanSessionError::InvalidStage {
                stage: self.stage,
                operation: "submit_feedback",
            });
        }
        let cycle_id = match self.cycle_id.clone() {
            Some(id) => id,
            None => return Err(PlanSessionError::NoDraft),
        };

        let modification_type = classify_modification(user_message, explicit_type);
        tracing::debug!(
            "modifying plan for cycle {} as '{}'",
            cycle_id,
            modification_type
        );

        self.stage = PlanStage::Generating;
        let token = self.begin_request();

        match backend
            .modify_plan(&self.project_name, &cycle_id, modification_type, user_message)
            .await
        {
            Ok(plan) => match self.accept_draft(token, plan) {
                Ok(()) => self.draft.as_ref().ok_or(PlanSessionError::NoDraft),
                Err(e) => {
                    if !matches!(e, PlanSessionError::Superseded) {
                        self.stage = PlanStage::ConfirmingRejection;
                    }
                    Err(e)
                }
            },
            Err(e) => {
                self.stage = PlanStage::ConfirmingRejection;
                Err(PlanSessionError::Backend(e))
            }
        }
    }

    /// Approve the current proposal, materializing it into test records.
    /// At most once per cycle: a repeat surfaces the backend's contract
    /// error, and a confirmed session rejects the call outright.
    pub async fn approve(
        &mut self,
        backend: &dyn PlanningBackend,
    ) -> Result<&ApprovalReceipt, PlanSessionError> {
        if self.stage != PlanStage::Proposal {
            return Err(PlanSessionError::InvalidStage {
                stage: self.stage,
                operation: "approve",
            });
        }
        let cycle_id = match self.cycle_id.clone() {
            Some(id) => id,
            None => return Err(PlanSessionError::NoDraft),
        };

        self.stage = PlanStage::Approving;
        match backend.approve_plan(&cycle_id).await {
            Ok(receipt) => {
                tracing::debug!(
                    "cycle {} approved: {} tests created",
                    cycle_id,
                    receipt.tests_created
                );
                self.approval = Some(receipt);
                self.stage = PlanStage::Confirmed;
                self.approval.as_ref().ok_or(PlanSessionError::NoDraft)
            }
            Err(e) => {
                // Surfaced inline; the proposal stays current. Contract
                // errors (PlanNotFound/AlreadyApproved) arrive typed.
                self.stage = PlanStage::Proposal;
                Err(PlanSessionError::Backend(e))
            }
        }
    }

    fn begin_request(&mut self) -> u64 {
        self.request_seq += 1;
        self.request_seq
    }

    /// Accept a generated draft if its request token is still the latest.
    /// Validates the dependency DAG before replacing the current draft.
    fn accept_draft(&mut self, token: u64, plan: TestPlan) -> Result<(), PlanSessionError> {
        if token != self.request_seq {
            tracing::warn!(
                "discarding stale plan response for cycle {} (token {} < {})",
                plan.cycle_id,
                token,
                self.request_seq
            );
            return Err(PlanSessionError::Superseded);
        }

        let batches = DependencyValidator::validate(&plan)?;

        self.prior_draft = self.draft.take();
        self.cycle_id = Some(plan.cycle_id.clone());
        self.draft = Some(plan);
        self.batches = batches;
        self.stage = PlanStage::Proposal;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
