//! Blocker Detector
//!
//! Thin service over the backend detection call. Filters the response down
//! to blockers that were actually detected and flags count mismatches.

use uat_pilot_core::backend::{BlockerDetection, PlanningBackend};
use uat_pilot_core::{Blocker, BackendResult};

/// Runs blocker detection and normalizes the response.
pub struct BlockerDetector;

impl BlockerDetector {
    /// Detect blockers for a project, returning only detected entries.
    pub async fn detect(
        backend: &dyn PlanningBackend,
        project_name: &str,
        project_path: &str,
    ) -> BackendResult<BlockerDetection> {
        let mut detection = backend.detect_blockers(project_name, project_path).await?;
        detection.blockers = Self::normalize(detection.blockers);

        if detection.blockers_detected as usize != detection.blockers.len() {
            tracing::warn!(
                "blocker count mismatch for '{}': reported {}, received {} detected",
                project_name,
                detection.blockers_detected,
                detection.blockers.len()
            );
            detection.blockers_detected = detection.blockers.len() as u32;
        }

        Ok(detection)
    }

    /// Drop entries the backend marked as not detected and de-duplicate ids,
    /// preserving order.
    fn normalize(blockers: Vec<Blocker>) -> Vec<Blocker> {
        let mut seen = std::collections::HashSet::new();
        blockers
            .into_iter()
            .filter(|b| b.detected)
            .filter(|b| seen.insert(b.id.clone()))
            .collect()
    }
}
