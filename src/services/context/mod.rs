//! Context Gathering Service
//!
//! Assembles project readiness signals into a `ProjectContext` snapshot.
//! Persistence is an external collaborator reached through the
//! `ProjectStore` trait; this service is a pure read.

pub mod gatherer;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::context::{Cycle, Feature};

pub use gatherer::ContextGatherer;

/// Errors surfaced by the external project store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),
}

/// Read interface over persisted project data.
///
/// The store owns projects, features, cycles, and test records; the planning
/// core only ever reads the summaries it needs for a snapshot.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Load the project's specification document, if one exists.
    async fn load_spec(&self, project_name: &str) -> Result<Option<String>, StoreError>;

    /// List completed work items for the project.
    async fn completed_features(&self, project_name: &str) -> Result<Vec<Feature>, StoreError>;

    /// List prior UAT cycles for the project.
    async fn uat_cycles(&self, project_name: &str) -> Result<Vec<Cycle>, StoreError>;
}
