//! Modification Type Classifier
//!
//! Infers the modification category from free-text user requests by keyword
//! matching. The inference is a heuristic, not authoritative: an explicitly
//! supplied type always takes precedence, and a misclassification is a
//! correctable input, never a fatal error.

use std::collections::HashSet;

use uat_pilot_core::ModificationType;

/// Ordered keyword table. Earlier rows win when a message matches several;
/// reordering rows changes classification, so the table is covered
/// exhaustively by tests.
const KEYWORD_TABLE: &[(ModificationType, &[&str])] = &[
    (
        ModificationType::RemoveTests,
        &["remove", "skip", "delete", "drop"],
    ),
    (
        ModificationType::AddTests,
        &["add", "more", "extra", "additional"],
    ),
    (ModificationType::ChangePhases, &["phase", "phases"]),
    (
        ModificationType::AdjustJourneys,
        &["journey", "journeys", "flow", "flows"],
    ),
];

/// Classify a modification request.
///
/// `explicit` is the server-side (or caller-supplied) classification and
/// overrides the keyword inference when present.
pub fn classify_modification(
    user_message: &str,
    explicit: Option<ModificationType>,
) -> ModificationType {
    if let Some(t) = explicit {
        return t;
    }

    let tokens: HashSet<String> = user_message
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect();

    for (modification_type, keywords) in KEYWORD_TABLE {
        if keywords.iter().any(|k| tokens.contains(*k)) {
            return *modification_type;
        }
    }

    ModificationType::Custom
}
