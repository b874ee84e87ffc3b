//! Typed store-error values, plus the one place this system inspects error
//! text instead of types: classifying the task store's unstructured error
//! strings (spec §9 "Exceptions as signals").

use regex::RegexSet;
use std::sync::LazyLock;
use thiserror::Error;

/// Typed classification of a task-store error, detected only from the
/// store client's error text — the store is an external collaborator that
/// does not expose structured error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The task was already claimed by another agent; a benign scheduling race.
    AlreadyClaimed,
    /// The referenced task or agent does not exist.
    NotFound,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("already claimed")]
    AlreadyClaimed,
    #[error("not found: {0}")]
    NotFound(String),
}

static ALREADY_CLAIMED: LazyLock<RegexSet> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    RegexSet::new([
        r"(?i)already (claimed|assigned|taken)",
        r"(?i)claimed by",
        r"(?i)cannot claim .* already",
    ])
    .expect("static regex set is valid")
});

static NOT_FOUND: LazyLock<RegexSet> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    RegexSet::new([r"(?i)not found", r"(?i)does not exist", r"(?i)no such"]).expect("static regex set is valid")
});

/// Classify a task-store error message. Returns `None` if the message
/// matches neither the "already claimed" nor "not found" patterns, in which
/// case the caller should treat the error as a transient store failure.
pub fn classify_store_error(message: &str) -> Option<StoreErrorKind> {
    if ALREADY_CLAIMED.is_match(message) {
        Some(StoreErrorKind::AlreadyClaimed)
    } else if NOT_FOUND.is_match(message) {
        Some(StoreErrorKind::NotFound)
    } else {
        None
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
