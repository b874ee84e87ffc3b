//! Mutation logging — spec §4.G ambient addition.
//!
//! Every task mutation driven through the IPC control plane is appended,
//! best-effort, to a synthetic "system" agent's event ring so the same
//! `read_message_history`/UI machinery that surfaces agent activity also
//! surfaces who changed what.

use fleet_core::AgentLocalId;
use serde_json::{json, Value};

use crate::registry::Registry;

/// Local id of the synthetic system agent that mutation events are
/// attributed to. Callers must `Registry::register` a record under this id
/// once at daemon startup; logging stays best-effort if they don't.
pub const SYSTEM_AGENT_ID: &str = "system";

const MAX_CLOSE_REASON_LEN: usize = 140;

/// Truncate a close reason to the documented budget, on a char boundary.
pub fn truncate_close_reason(reason: &str) -> String {
    if reason.chars().count() <= MAX_CLOSE_REASON_LEN {
        return reason.to_string();
    }
    reason.chars().take(MAX_CLOSE_REASON_LEN).collect()
}

/// Record one mutation event. `fields` carries action-specific detail (e.g.
/// `{"status": "blocked"}` for `update`, `{"reason": "..."}` for `close`).
/// Failures are swallowed: audit logging must never fail the mutation it
/// describes.
pub fn record_mutation(registry: &Registry, action: &str, actor: Option<&str>, issue_id: &str, fields: Value) {
    let payload = json!({
        "kind": "mutation",
        "action": action,
        "actor": actor,
        "issueId": issue_id,
        "fields": fields,
    });
    let _ = registry.push_event(&AgentLocalId::new(SYSTEM_AGENT_ID), payload);
}
