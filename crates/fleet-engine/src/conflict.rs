//! Conflict Checker — spec §4.A.
//!
//! Pure function: detect label overlap between a candidate task and the
//! currently in-progress tasks. Only labels starting with a conflict
//! prefix (`module:`, `file:`) participate; everything else is ignored.

use std::collections::BTreeSet;

/// Label prefixes that participate in conflict detection (spec §4.A).
pub const CONFLICT_PREFIXES: &[&str] = &["module:", "file:"];

fn is_conflict_label(label: &str) -> bool {
    CONFLICT_PREFIXES.iter().any(|prefix| label.starts_with(prefix))
}

/// Outcome of checking a candidate task's labels against the in-progress set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConflictResult {
    pub conflicting: bool,
    /// Ids of in-progress tasks this candidate conflicts with, sorted.
    pub conflict_with: BTreeSet<String>,
    /// The conflict-relevant labels that actually overlapped, sorted.
    pub overlapping_labels: BTreeSet<String>,
}

/// One in-progress task as seen by the conflict checker: just an id and
/// its labels, so callers don't need to hand over a full `Task`.
pub struct InProgressLabels<'a> {
    pub id: &'a str,
    pub labels: &'a [String],
}

/// Detect label overlap between `candidate_labels` and `in_progress` (spec
/// §4.A). An empty candidate set never conflicts. Output ordering is
/// deterministic (lexicographic) to keep tests stable (spec §4.A).
pub fn check_label_conflicts(candidate_labels: &[String], in_progress: &[InProgressLabels<'_>]) -> ConflictResult {
    let candidate_conflict_labels: BTreeSet<&str> =
        candidate_labels.iter().map(String::as_str).filter(|l| is_conflict_label(l)).collect();

    if candidate_conflict_labels.is_empty() {
        return ConflictResult::default();
    }

    let mut conflict_with = BTreeSet::new();
    let mut overlapping_labels = BTreeSet::new();

    for task in in_progress {
        for label in task.labels {
            if candidate_conflict_labels.contains(label.as_str()) {
                conflict_with.insert(task.id.to_string());
                overlapping_labels.insert(label.clone());
            }
        }
    }

    ConflictResult { conflicting: !conflict_with.is_empty(), conflict_with, overlapping_labels }
}

#[cfg(test)]
#[path = "conflict_tests.rs"]
mod tests;
