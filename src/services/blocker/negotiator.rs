//! Blocker Resolution Negotiator
//!
//! Sequential state machine over the ordered list of detected blockers.
//! Each blocker moves through `Presenting -> ActionChosen -> (Probing ->
//! ProbeFailed | ProbeSucceeded) -> Ready`; `Next` only leaves the last
//! blocker once every index is `Ready` and every `wait` resolution carries a
//! successful probe.
//!
//! The chosen action is mutable while an index is still negotiating
//! (`Presenting`, `ActionChosen`, `ProbeFailed`) and becomes immutable once
//! the index commits to `Ready`; committing also posts the action to the
//! backend exactly once per blocker. `Back` re-presents a committed index
//! read-only, preserving its action and never re-probing.

use std::fmt;

use thiserror::Error;

use uat_pilot_core::backend::PlanningBackend;
use uat_pilot_core::{
    BackendError, Blocker, BlockerAction, BlockerConfig, BlockerResolution, ConnectionTestResult,
};

// ---------------------------------------------------------------------------
// Stages & errors
// ---------------------------------------------------------------------------

/// Per-blocker negotiation stage.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockerStage {
    /// Showing the blocker, no action committed
    Presenting,
    /// Action picked but not yet committed
    ActionChosen(BlockerAction),
    /// Connection probe in flight
    Probing,
    /// Probe succeeded, commit pending
    ProbeSucceeded,
    /// Probe failed; `Retry` or a different action re-enables progress
    ProbeFailed { message: String },
    /// Action committed and posted; `Next` is enabled
    Ready,
}

impl fmt::Display for BlockerStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockerStage::Presenting => write!(f, "presenting"),
            BlockerStage::ActionChosen(action) => write!(f, "action_chosen({})", action),
            BlockerStage::Probing => write!(f, "probing"),
            BlockerStage::ProbeSucceeded => write!(f, "probe_succeeded"),
            BlockerStage::ProbeFailed { .. } => write!(f, "probe_failed"),
            BlockerStage::Ready => write!(f, "ready"),
        }
    }
}

/// Errors from invalid negotiation transitions or the backend.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("Cannot negotiate an empty blocker list")]
    EmptyBlockerList,

    #[error("Action for blocker '{0}' is already committed")]
    ActionCommitted(String),

    #[error("Transition '{event}' is not valid in stage {stage}")]
    InvalidTransition { stage: String, event: &'static str },

    #[error("Blocker '{0}' is not ready; choose an action (and pass its probe) first")]
    NotReady(String),

    #[error("Cannot go back from the first blocker")]
    AtFirstBlocker,

    #[error("Negotiation already completed")]
    AlreadyComplete,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result of a successful `next()`.
#[derive(Debug)]
pub enum NegotiationProgress {
    /// Advanced to the blocker at this index
    Advanced(usize),
    /// All blockers resolved; payload for plan generation
    Complete(BlockerConfig),
}

// ---------------------------------------------------------------------------
// Negotiator
// ---------------------------------------------------------------------------

struct NegotiationEntry {
    blocker: Blocker,
    stage: BlockerStage,
    /// Action picked but not yet committed
    pending: Option<BlockerAction>,
    /// Latest probe result; each retry supersedes the previous one
    probe: Option<ConnectionTestResult>,
}

impl NegotiationEntry {
    fn new(blocker: Blocker) -> Self {
        Self {
            blocker,
            stage: BlockerStage::Presenting,
            pending: None,
            probe: None,
        }
    }

    fn is_committed(&self) -> bool {
        self.blocker.action.is_some()
    }

    fn satisfies_invariant(&self) -> bool {
        match self.blocker.action {
            Some(BlockerAction::Wait) => self.probe.as_ref().map(|p| p.success).unwrap_or(false),
            Some(_) => true,
            None => false,
        }
    }
}

/// One negotiation session over an ordered blocker list.
///
/// Transitions are exclusive: each takes `&mut self` and resolves fully
/// before the next can start, which is the session's pending gate.
pub struct BlockerNegotiator {
    project_name: String,
    entries: Vec<NegotiationEntry>,
    index: usize,
    complete: bool,
}

impl BlockerNegotiator {
    /// Start a session over detected blockers. The list must be non-empty;
    /// with nothing detected there is nothing to negotiate.
    pub fn new(
        project_name: impl Into<String>,
        blockers: Vec<Blocker>,
    ) -> Result<Self, NegotiationError> {
        if blockers.is_empty() {
            return Err(NegotiationError::EmptyBlockerList);
        }
        Ok(Self {
            project_name: project_name.into(),
            entries: blockers.into_iter().map(NegotiationEntry::new).collect(),
            index: 0,
            complete: false,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// The blocker currently presented.
    pub fn current(&self) -> &Blocker {
        &self.entries[self.index].blocker
    }

    /// Stage of the current blocker.
    pub fn stage(&self) -> &BlockerStage {
        &self.entries[self.index].stage
    }

    /// Latest probe result for the current blocker, if any.
    pub fn probe_result(&self) -> Option<&ConnectionTestResult> {
        self.entries[self.index].probe.as_ref()
    }

    /// Whether every blocker satisfies the submission invariant: a committed
    /// action, and for `wait` a successful probe.
    pub fn is_ready_to_submit(&self) -> bool {
        self.entries.iter().all(|e| e.satisfies_invariant())
    }

    /// Pick an action for the current blocker.
    ///
    /// `wait` runs a connection probe and only commits on success; any other
    /// action commits immediately. Valid while the index has not committed:
    /// `Presenting`, `ActionChosen`, `ProbeFailed`, or `ProbeSucceeded`
    /// (re-commit after a failed submission, without re-probing).
    pub async fn select_action(
        &mut self,
        action: BlockerAction,
        backend: &dyn PlanningBackend,
    ) -> Result<&BlockerStage, NegotiationError> {
        if self.complete {
            return Err(NegotiationError::AlreadyComplete);
        }
        let entry = &mut self.entries[self.index];
        if entry.is_committed() {
            return Err(NegotiationError::ActionCommitted(entry.blocker.id.clone()));
        }
        match entry.stage {
            BlockerStage::Presenting
            | BlockerStage::ActionChosen(_)
            | BlockerStage::ProbeFailed { .. }
            | BlockerStage::ProbeSucceeded => {}
            _ => {
                return Err(NegotiationError::InvalidTransition {
                    stage: entry.stage.to_string(),
                    event: "select_action",
                });
            }
        }

        // Changing the action discards any prior probe evidence.
        if entry.pending != Some(action) {
            entry.probe = None;
        }
        entry.pending = Some(action);
        entry.stage = BlockerStage::ActionChosen(action);

        if action == BlockerAction::Wait {
            let already_verified = entry.probe.as_ref().map(|p| p.success).unwrap_or(false);
            if !already_verified {
                self.probe_current(backend).await?;
                if !matches!(self.entries[self.index].stage, BlockerStage::ProbeSucceeded) {
                    return Ok(self.stage());
                }
            } else {
                self.entries[self.index].stage = BlockerStage::ProbeSucceeded;
            }
        }

        self.commit_current(backend).await?;
        Ok(self.stage())
    }

    /// Re-run the probe after a failure. Idempotent: no side effects beyond
    /// the connection test itself, and no retry limit is imposed here.
    pub async fn retry_probe(
        &mut self,
        backend: &dyn PlanningBackend,
    ) -> Result<&BlockerStage, NegotiationError> {
        if self.complete {
            return Err(NegotiationError::AlreadyComplete);
        }
        let entry = &self.entries[self.index];
        if !matches!(entry.stage, BlockerStage::ProbeFailed { .. }) {
            return Err(NegotiationError::InvalidTransition {
                stage: entry.stage.to_string(),
                event: "retry",
            });
        }

        self.probe_current(backend).await?;
        if matches!(self.entries[self.index].stage, BlockerStage::ProbeSucceeded) {
            self.commit_current(backend).await?;
        }
        Ok(self.stage())
    }

    /// Advance past the current blocker. Only valid from `Ready`; from the
    /// last blocker, verifies the submission invariant and emits the
    /// configured-blocker payload, terminating the session.
    pub fn next(&mut self) -> Result<NegotiationProgress, NegotiationError> {
        if self.complete {
            return Err(NegotiationError::AlreadyComplete);
        }
        let entry = &self.entries[self.index];
        if entry.stage != BlockerStage::Ready {
            return Err(NegotiationError::NotReady(entry.blocker.id.clone()));
        }

        if self.index + 1 < self.entries.len() {
            self.index += 1;
            return Ok(NegotiationProgress::Advanced(self.index));
        }

        // Guard against starting execution against an unverified dependency.
        if !self.is_ready_to_submit() {
            let blocked = self
                .entries
                .iter()
                .find(|e| !e.satisfies_invariant())
                .map(|e| e.blocker.id.clone())
                .unwrap_or_default();
            return Err(NegotiationError::NotReady(blocked));
        }

        self.complete = true;
        let resolutions = self
            .entries
            .iter()
            .filter_map(|e| {
                e.blocker.action.map(|action| BlockerResolution {
                    blocker_id: e.blocker.id.clone(),
                    blocker_type: e.blocker.blocker_type,
                    action,
                    probe: e.probe.clone(),
                    notes: e.blocker.notes.clone(),
                })
            })
            .collect();
        Ok(NegotiationProgress::Complete(BlockerConfig { resolutions }))
    }

    /// Return to the previous blocker, preserving its chosen action and
    /// probe evidence (no re-probe is forced).
    pub fn back(&mut self) -> Result<usize, NegotiationError> {
        if self.complete {
            return Err(NegotiationError::AlreadyComplete);
        }
        if self.index == 0 {
            return Err(NegotiationError::AtFirstBlocker);
        }
        self.index -= 1;
        Ok(self.index)
    }

    async fn probe_current(
        &mut self,
        backend: &dyn PlanningBackend,
    ) -> Result<(), NegotiationError> {
        let entry = &mut self.entries[self.index];
        entry.stage = BlockerStage::Probing;
        let blocker_type = entry.blocker.blocker_type;
        let service = blocker_type.probe_service();

        match backend.test_connection(blocker_type, service).await {
            Ok(result) => {
                let entry = &mut self.entries[self.index];
                if result.success {
                    entry.stage = BlockerStage::ProbeSucceeded;
                } else {
                    entry.stage = BlockerStage::ProbeFailed {
                        message: result.message.clone(),
                    };
                }
                entry.probe = Some(result);
            }
            Err(e) => {
                // Transport failures on the probe are probe failures: local
                // to this stage and recoverable via retry.
                tracing::warn!(
                    "connection probe failed for blocker '{}': {}",
                    self.entries[self.index].blocker.id,
                    e
                );
                let entry = &mut self.entries[self.index];
                entry.probe = Some(ConnectionTestResult::failed(e.to_string()));
                entry.stage = BlockerStage::ProbeFailed {
                    message: e.to_string(),
                };
            }
        }
        Ok(())
    }

    /// Commit the pending action: post it to the backend (at most once per
    /// blocker) and freeze it on the record.
    async fn commit_current(
        &mut self,
        backend: &dyn PlanningBackend,
    ) -> Result<(), NegotiationError> {
        let entry = &self.entries[self.index];
        let action = match entry.pending {
            Some(action) => action,
            None => {
                return Err(NegotiationError::InvalidTransition {
                    stage: entry.stage.to_string(),
                    event: "commit",
                });
            }
        };

        backend
            .respond_blocker(&entry.blocker.id, action, &self.project_name)
            .await?;

        let entry = &mut self.entries[self.index];
        entry.blocker.action = Some(action);
        entry.stage = BlockerStage::Ready;
        tracing::debug!(
            "blocker '{}' committed to '{}'",
            entry.blocker.id,
            action
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
