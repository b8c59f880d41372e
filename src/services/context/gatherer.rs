//! Context Gatherer
//!
//! Builds the immutable `ProjectContext` snapshot for a planning session.

use std::sync::Arc;

use crate::models::context::ProjectContext;

use super::{ProjectStore, StoreError};

/// Gathers readiness signals from the project store.
pub struct ContextGatherer {
    store: Arc<dyn ProjectStore>,
}

impl ContextGatherer {
    pub fn new(store: Arc<dyn ProjectStore>) -> Self {
        Self { store }
    }

    /// Assemble a fresh snapshot. Callers re-gather rather than mutate.
    pub async fn gather(&self, project_name: &str) -> Result<ProjectContext, StoreError> {
        let spec_content = self.store.load_spec(project_name).await?;
        let completed_features = self.store.completed_features(project_name).await?;
        let uat_cycles = self.store.uat_cycles(project_name).await?;

        tracing::debug!(
            "gathered context for '{}': spec={}, features={}, cycles={}",
            project_name,
            spec_content.is_some(),
            completed_features.len(),
            uat_cycles.len()
        );

        Ok(ProjectContext::from_parts(
            spec_content,
            completed_features,
            uat_cycles,
        ))
    }
}
