//! Test Plan Service
//!
//! The conversational generate/modify/approve flow for test-plan drafts.
//!
//! ## Architecture
//! - `classifier.rs` - Keyword classification of modification requests
//! - `dependency.rs` - Scenario dependency DAG validation and batching
//! - `session.rs` - Plan session state machine with the superseding guard

pub mod classifier;
pub mod dependency;
pub mod session;

pub use classifier::classify_modification;
pub use dependency::{DependencyError, DependencyValidator, ScenarioBatch};
pub use session::{PlanSession, PlanSessionError, PlanStage};
