//! Test Plan Types
//!
//! Data structures for the test-plan lifecycle: generated drafts
//! (journeys × phases × scenarios), modification requests, approval receipts,
//! and the execution-trigger response contract.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Phase & Priority Types
// ============================================================================

/// Testing tier used to bucket scenarios by purpose and risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestPhase {
    Smoke,
    Functional,
    Regression,
    Uat,
}

impl fmt::Display for TestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestPhase::Smoke => write!(f, "smoke"),
            TestPhase::Functional => write!(f, "functional"),
            TestPhase::Regression => write!(f, "regression"),
            TestPhase::Uat => write!(f, "uat"),
        }
    }
}

impl TestPhase {
    /// Parse a phase from its wire name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "smoke" => Some(TestPhase::Smoke),
            "functional" => Some(TestPhase::Functional),
            "regression" => Some(TestPhase::Regression),
            "uat" => Some(TestPhase::Uat),
            _ => None,
        }
    }
}

/// Scenario priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestPriority {
    High,
    Medium,
    Low,
}

impl fmt::Display for TestPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestPriority::High => write!(f, "High"),
            TestPriority::Medium => write!(f, "Medium"),
            TestPriority::Low => write!(f, "Low"),
        }
    }
}

// ============================================================================
// Scenario & Plan Types
// ============================================================================

/// A single test scenario in a plan.
///
/// Dependencies reference other scenario ids and must form a DAG; the plan
/// session validates every received draft before accepting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestScenario {
    pub id: String,
    pub phase: TestPhase,
    /// Named user-facing workflow this scenario belongs to (e.g. "Checkout")
    pub journey: String,
    pub scenario: String,
    pub description: String,
    pub test_type: String,
    #[serde(default)]
    pub steps: Vec<String>,
    pub expected_result: String,
    pub priority: TestPriority,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// A journey the generator identified from project context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyProposal {
    pub name: String,
    pub description: String,
}

/// A recommended testing phase with its rationale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseProposal {
    pub phase: TestPhase,
    pub description: String,
}

/// A generated test plan draft.
///
/// One draft is current per `cycle_id` at a time; modification replaces the
/// draft wholesale, and approval freezes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestPlan {
    pub cycle_id: String,
    #[serde(default)]
    pub journeys_identified: Vec<JourneyProposal>,
    #[serde(default)]
    pub recommended_phases: Vec<PhaseProposal>,
    #[serde(default)]
    pub test_scenarios: Vec<TestScenario>,
    /// Plan-level dependency map, merged with per-scenario dependencies
    /// during validation.
    #[serde(default)]
    pub test_dependencies: HashMap<String, Vec<String>>,
}

impl TestPlan {
    /// Ids of every scenario in the draft.
    pub fn scenario_ids(&self) -> Vec<&str> {
        self.test_scenarios.iter().map(|s| s.id.as_str()).collect()
    }
}

// ============================================================================
// Modification & Approval Types
// ============================================================================

/// Category of plan-modification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationType {
    AddTests,
    RemoveTests,
    ChangePhases,
    AdjustJourneys,
    Custom,
}

impl fmt::Display for ModificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModificationType::AddTests => write!(f, "add_tests"),
            ModificationType::RemoveTests => write!(f, "remove_tests"),
            ModificationType::ChangePhases => write!(f, "change_phases"),
            ModificationType::AdjustJourneys => write!(f, "adjust_journeys"),
            ModificationType::Custom => write!(f, "custom"),
        }
    }
}

/// Result of committing an approved plan into persisted test records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalReceipt {
    pub tests_created: u32,
    #[serde(default)]
    pub test_ids: Vec<i64>,
}

// ============================================================================
// Execution Trigger Types
// ============================================================================

/// How the backend runs a triggered cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Parallel,
    Sequential,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Parallel => write!(f, "parallel"),
            ExecutionMode::Sequential => write!(f, "sequential"),
        }
    }
}

/// Response contract of the execution trigger. Owned by the backend;
/// consumed here only in this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub cycle_id: String,
    pub agents_spawned: u32,
    pub execution_mode: ExecutionMode,
}

// ============================================================================
// Tests
// ============================================================================
