//! UAT Pilot - Planning & Live-Progress Orchestration
//!
//! Coordinates planning, approval, and real-time monitoring of automated UAT
//! execution cycles:
//! - Context gathering and blocker detection for project readiness
//! - The blocker-resolution negotiation state machine
//! - The test-plan generate/modify/approve conversational flow
//! - The per-cycle WebSocket progress stream with reconnection/backoff
//!
//! Persistence, test execution, and rendering are external collaborators
//! reached through the `ProjectStore` and `PlanningBackend` seams.

pub mod models;
pub mod services;
pub mod state;
pub mod utils;

// Re-export commonly used items
pub use models::context::{Cycle, CycleStatus, Feature, ProjectContext};
pub use services::blocker::{
    BlockerDetector, BlockerNegotiator, BlockerStage, NegotiationError, NegotiationProgress,
};
pub use services::context::{ContextGatherer, ProjectStore, StoreError};
pub use services::execution::{ExecutionError, ExecutionLauncher};
pub use services::notify::{NotificationHub, Toast, ToastLevel};
pub use services::plan::{
    classify_modification, DependencyValidator, PlanSession, PlanSessionError, PlanStage,
};
pub use services::progress::{
    ProgressStreamHandle, ReconnectPolicy, StreamConfig, StreamController, StreamStatus,
    StreamUpdate,
};
pub use state::AppState;
pub use utils::error::{AppError, AppResult};

// The REST transport, for callers wiring their own state
pub use uat_pilot_api::UatApiClient;
