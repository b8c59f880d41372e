//! Project Context Models
//!
//! Readiness signals gathered before planning a UAT cycle. The context is an
//! immutable snapshot: it is never mutated, only re-fetched.

use serde::{Deserialize, Serialize};

/// A completed work item summary from the project store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Completion timestamp (ISO-8601)
    #[serde(default)]
    pub completed_at: Option<String>,
}

/// Status of a prior UAT cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Summary of one prior UAT cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cycle {
    pub id: String,
    pub cycle_number: u32,
    pub status: CycleStatus,
    /// Created timestamp (ISO-8601)
    pub created_at: String,
}

/// Readiness snapshot for one planning session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectContext {
    pub has_spec: bool,
    #[serde(default)]
    pub spec_content: Option<String>,
    pub completed_features_count: usize,
    #[serde(default)]
    pub completed_features: Vec<Feature>,
    pub uat_cycles_count: usize,
    #[serde(default)]
    pub uat_cycles: Vec<Cycle>,
}

impl ProjectContext {
    /// Assemble a snapshot from its raw parts, deriving the counts.
    pub fn from_parts(
        spec_content: Option<String>,
        completed_features: Vec<Feature>,
        uat_cycles: Vec<Cycle>,
    ) -> Self {
        Self {
            has_spec: spec_content.is_some(),
            spec_content,
            completed_features_count: completed_features.len(),
            completed_features,
            uat_cycles_count: uat_cycles.len(),
            uat_cycles,
        }
    }

    /// Whether the project has any signal worth planning against.
    pub fn is_empty(&self) -> bool {
        !self.has_spec && self.completed_features.is_empty() && self.uat_cycles.is_empty()
    }
}
