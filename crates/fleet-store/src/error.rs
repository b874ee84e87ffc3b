//! Task-store error taxonomy — spec §7.
//!
//! Most store failures are typed. The one documented exception is the
//! external store's unstructured error text for "already claimed" and
//! "not found" conditions (spec §9 "Exceptions as signals"); callers that
//! need that classification use [`fleet_core::classify_store_error`] on
//! [`StoreError::Other`]'s message.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("already claimed: {0}")]
    AlreadyClaimed(String),
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Classify this error's message the way the scheduler does for a
    /// genuinely unstructured collaborator (spec §4.B `tryClaim`).
    pub fn message(&self) -> String {
        self.to_string()
    }
}
