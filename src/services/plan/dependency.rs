//! Scenario Dependency Validation
//!
//! Validates that a draft's scenario dependencies form a DAG and organizes
//! scenarios into execution batches. Per-scenario dependency lists and the
//! plan-level dependency map are merged before validation.

use std::collections::{HashMap, HashSet};

use uat_pilot_core::TestPlan;

/// A batch of scenarios that can run in parallel
#[derive(Debug, Clone)]
pub struct ScenarioBatch {
    /// Batch index (1-based for display)
    pub index: usize,
    /// Scenario IDs in this batch
    pub scenario_ids: Vec<String>,
}

impl ScenarioBatch {
    /// Create a new batch
    pub fn new(index: usize, scenario_ids: Vec<String>) -> Self {
        Self {
            index,
            scenario_ids,
        }
    }

    /// Check if batch is empty
    pub fn is_empty(&self) -> bool {
        self.scenario_ids.is_empty()
    }

    /// Get number of scenarios in batch
    pub fn len(&self) -> usize {
        self.scenario_ids.len()
    }
}

/// Errors that can occur during dependency validation
#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    #[error("Circular dependency detected: {0:?}")]
    CircularDependency(Vec<String>),

    #[error("Unknown dependency '{dependency}' in scenario '{scenario}'")]
    UnknownDependency {
        scenario: String,
        dependency: String,
    },

    #[error("Plan has no scenarios")]
    EmptyPlan,
}

/// Dependency validator for test-plan drafts
pub struct DependencyValidator;

impl DependencyValidator {
    /// Validate a draft and generate execution batches.
    ///
    /// Scenarios are organized into batches where each batch contains
    /// scenarios whose dependencies are all satisfied by previous batches.
    ///
    /// # Returns
    /// * `Ok(Vec<ScenarioBatch>)` - Ordered batches of scenario IDs
    /// * `Err(DependencyError)` - On unknown references or cycles
    pub fn validate(plan: &TestPlan) -> Result<Vec<ScenarioBatch>, DependencyError> {
        if plan.test_scenarios.is_empty() {
            return Err(DependencyError::EmptyPlan);
        }

        let deps = Self::effective_dependencies(plan)?;

        let mut batches = Vec::new();
        let mut satisfied: HashSet<String> = HashSet::new();
        let mut remaining: HashSet<String> = plan
            .test_scenarios
            .iter()
            .map(|s| s.id.clone())
            .collect();

        while !remaining.is_empty() {
            let mut batch = Vec::new();

            for scenario in &plan.test_scenarios {
                if remaining.contains(&scenario.id) {
                    let ready = deps
                        .get(scenario.id.as_str())
                        .map(|d| d.iter().all(|dep| satisfied.contains(dep)))
                        .unwrap_or(true);

                    if ready {
                        batch.push(scenario.id.clone());
                    }
                }
            }

            if batch.is_empty() {
                // Circular dependency detected
                let cycle = Self::find_cycle(&deps, &remaining);
                return Err(DependencyError::CircularDependency(cycle));
            }

            for id in &batch {
                remaining.remove(id);
                satisfied.insert(id.clone());
            }

            batches.push(ScenarioBatch::new(batches.len() + 1, batch));
        }

        Ok(batches)
    }

    /// Merge per-scenario dependencies with the plan-level map and validate
    /// that every reference points at an existing scenario.
    fn effective_dependencies(
        plan: &TestPlan,
    ) -> Result<HashMap<&str, Vec<String>>, DependencyError> {
        let scenario_ids: HashSet<&str> =
            plan.test_scenarios.iter().map(|s| s.id.as_str()).collect();

        let mut merged: HashMap<&str, Vec<String>> = HashMap::new();
        for scenario in &plan.test_scenarios {
            let mut deps: Vec<String> = scenario.dependencies.clone();
            if let Some(extra) = plan.test_dependencies.get(&scenario.id) {
                for dep in extra {
                    if !deps.contains(dep) {
                        deps.push(dep.clone());
                    }
                }
            }

            for dep in &deps {
                if !scenario_ids.contains(dep.as_str()) {
                    return Err(DependencyError::UnknownDependency {
                        scenario: scenario.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }

            merged.insert(scenario.id.as_str(), deps);
        }

        Ok(merged)
    }

    /// Detect circular dependencies using DFS
    fn find_cycle(
        deps: &HashMap<&str, Vec<String>>,
        remaining: &HashSet<String>,
    ) -> Vec<String> {
        for start_id in remaining {
            let mut visited = HashSet::new();
            let mut path = Vec::new();

            if Self::dfs_find_cycle(start_id, deps, &mut visited, &mut path) {
                // Trim path to just the cycle
                if let Some(last) = path.last() {
                    if let Some(pos) = path.iter().position(|id| id == last) {
                        return path[pos..].to_vec();
                    }
                }
                return path;
            }
        }

        Vec::new()
    }

    /// DFS helper to find cycles
    fn dfs_find_cycle(
        current: &str,
        deps: &HashMap<&str, Vec<String>>,
        visited: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> bool {
        // Check if current is already in path (cycle detected)
        if path.iter().any(|id| id == current) {
            path.push(current.to_string());
            return true;
        }

        // Skip if already fully visited
        if visited.contains(current) {
            return false;
        }

        path.push(current.to_string());

        if let Some(dependencies) = deps.get(current) {
            for dep in dependencies {
                if Self::dfs_find_cycle(dep, deps, visited, path) {
                    return true;
                }
            }
        }

        path.pop();
        visited.insert(current.to_string());
        false
    }
}
