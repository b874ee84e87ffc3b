//! RPC Handler Manager — spec §4.D.
//!
//! Attaches exactly one event listener per agent record and translates the
//! subprocess's JSON event stream into registry mutations, best-effort
//! store persistence, and (on terminal events) a [`TerminalOutcome`] for
//! the caller to act on. Never touches subprocess or IPC plumbing directly
//! (spec §9 "RPC event callbacks": the handler owns the sink + debouncer,
//! not the transport).

pub mod debounce;
pub mod event;
mod usage;

pub use debounce::{DebounceOutcome, Debouncer};
pub use event::{AgentEvent, AgentEventKind, EventParseError};
pub use usage::usage_delta_from_event;

use fleet_core::{AgentLocalId, Clock, RoleId, TaskId};
use fleet_store::TaskStore;
use serde_json::Value;
use tracing::warn;

use crate::registry::Registry;

/// What the manager decided to do after observing an `agent_end`/`rpc_exit`
/// event, for the Agent Loop to execute (spawn/stop subprocesses, which
/// this module has no access to).
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalOutcome {
    /// Worker (or designer-worker) finished; its last assistant text should
    /// seed the next verifier (spec §4.D "worker / designer-worker").
    WorkerFinished { task_id: TaskId, last_assistant_text: Option<String> },
    /// Verifier finished; the Lifecycle Engine should be consulted next
    /// (spec §4.D "verifier").
    VerifierFinished { task_id: TaskId },
    /// Any other role just finished; nothing further to dispatch.
    Finished,
    /// `rpc_exit` with a nonzero/errored exit: agent marked `dead`.
    Crashed { exit_code: Option<i64>, error: Option<String> },
}

/// Handle one raw event for `local_id` (spec §4.D steps 1-6). Returns a
/// terminal outcome when the event was `agent_end` or `rpc_exit`.
pub async fn handle_event<S: TaskStore, C: Clock>(
    registry: &Registry,
    store: &S,
    clock: &C,
    local_id: &AgentLocalId,
    tasks_agent_id: Option<&str>,
    event: Value,
) -> Option<TerminalOutcome> {
    // Step 1: append to the registry event ring.
    if let Err(err) = registry.push_event(local_id, event.clone()) {
        warn!(agent_id = %local_id, error = %err, "failed to append event to registry ring");
    }

    // Step 2: persist best-effort; never fatal.
    if let Some(tasks_agent_id) = tasks_agent_id {
        if let Err(err) = store.record_agent_event(tasks_agent_id, event.clone()).await {
            warn!(agent_id = %local_id, error = %err, "failed to persist agent event");
        }
    }

    let event_type = event.get("type").and_then(Value::as_str).unwrap_or_default();

    // Step 3: usage delta on `message_end` assistant events.
    if event_type == "message_end" {
        if let Some(delta) = usage_delta_from_event(&event) {
            if let Err(err) = registry.apply_usage_delta(local_id, delta) {
                warn!(agent_id = %local_id, error = %err, "failed to apply usage delta");
            }
            let context_tokens = delta.input + delta.cache_read;
            if let Err(err) = registry.set_context_tokens(local_id, context_tokens) {
                warn!(agent_id = %local_id, error = %err, "failed to update context tokens");
            }
            if let Some(tasks_agent_id) = tasks_agent_id {
                let snapshot = registry.get(local_id).map(|r| r.usage);
                if let Some(usage) = snapshot {
                    let payload = serde_json::json!({
                        "input": usage.input,
                        "output": usage.output,
                        "cacheRead": usage.cache_read,
                        "cacheWrite": usage.cache_write,
                        "totalTokens": usage.total_tokens,
                        "cost": usage.cost,
                    });
                    if let Err(err) = store.record_agent_usage(tasks_agent_id, payload).await {
                        warn!(agent_id = %local_id, error = %err, "failed to snapshot usage");
                    }
                }
            }
        }
    }

    // Step 4: compaction count.
    if event_type == "auto_compaction_end" {
        let aborted = event.get("aborted").and_then(Value::as_bool).unwrap_or(false);
        let result_truthy = event.get("result").map(is_truthy).unwrap_or(false);
        if !aborted && result_truthy {
            if let Err(err) = registry.increment_compaction_count(local_id) {
                warn!(agent_id = %local_id, error = %err, "failed to increment compaction count");
            }
        }
    }

    // Step 5: capture context window on first successful getState().
    if event_type == "get_state" {
        if let Some(window) = event.get("model").and_then(|m| m.get("contextWindow")).and_then(Value::as_u64) {
            if let Err(err) = registry.set_context_window(local_id, window) {
                warn!(agent_id = %local_id, error = %err, "failed to capture context window");
            }
        }
    }

    registry.touch_last_activity(local_id, clock.epoch_ms()).ok();

    match event_type {
        "agent_end" => Some(handle_agent_end(registry, local_id, &event)),
        "rpc_exit" => Some(handle_rpc_exit(registry, local_id, &event)),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// `agent_end` branch (spec §4.D): the outcome depends on the exiting
/// agent's role, not the event payload.
fn handle_agent_end(registry: &Registry, local_id: &AgentLocalId, event: &Value) -> TerminalOutcome {
    let Some(record) = registry.get(local_id) else {
        return TerminalOutcome::Finished;
    };
    let Some(task_id) = record.task_id.clone() else {
        return TerminalOutcome::Finished;
    };
    match record.role {
        RoleId::Implementer => {
            let last_assistant_text = event.get("lastAssistantText").and_then(Value::as_str).map(str::to_string);
            TerminalOutcome::WorkerFinished { task_id, last_assistant_text }
        }
        RoleId::Verifier => TerminalOutcome::VerifierFinished { task_id },
        _ => TerminalOutcome::Finished,
    }
}

/// `rpc_exit` branch (spec §4.D): exit code 0 and no error text means a
/// graceful finish; anything else is a crash.
fn handle_rpc_exit(_registry: &Registry, _local_id: &AgentLocalId, event: &Value) -> TerminalOutcome {
    let exit_code = event.get("exitCode").and_then(Value::as_i64);
    let error = event.get("error").and_then(Value::as_str).map(str::to_string);
    if exit_code == Some(0) && error.is_none() {
        TerminalOutcome::Finished
    } else {
        TerminalOutcome::Crashed { exit_code, error }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
