//! Services
//!
//! Business logic services for the planning core. Services hold the state
//! machines and protocol handling; transport lives in `uat-pilot-api`.

pub mod blocker;
pub mod context;
pub mod execution;
pub mod notify;
pub mod plan;
pub mod progress;

pub use blocker::{BlockerDetector, BlockerNegotiator, NegotiationProgress};
pub use context::{ContextGatherer, ProjectStore};
pub use execution::ExecutionLauncher;
pub use notify::{NotificationHub, Toast, ToastLevel};
pub use plan::{PlanSession, PlanStage};
pub use progress::{ProgressStreamHandle, StreamConfig, StreamStatus, StreamUpdate};
