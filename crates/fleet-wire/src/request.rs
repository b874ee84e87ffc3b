//! Control-plane message envelope — spec §4.G, §6, §8 property 4.
//!
//! `parse` performs only envelope-level validation (field presence/shape,
//! numeric clamping, enum membership for purely syntactic enums). Checks
//! that require runtime state — "task must exist", "role must be declared
//! by the Role Registry", "target must be in the role's allowed advance
//! set" — are the daemon IPC handler's job once it has the registry/store
//! in hand (spec §4.G table "validation" column, §4.C task-boundary check).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::IpcError;

pub const KNOWN_TYPES: &[&str] = &[
    "wake",
    "start_tasks",
    "tasks_request",
    "advance_lifecycle",
    "broadcast",
    "interrupt_agent",
    "steer_agent",
    "replace_agent",
    "stop_agents_for_task",
    "complain",
    "revoke_complaint",
    "wait_for_agent",
    "list_active_agents",
    "list_task_agents",
    "read_message_history",
    "pending_side_effects",
    "approve_side_effects",
    "reject_side_effects",
];

/// Roles the `replace_agent` message is allowed to request (spec §4.E preconditions).
pub const REPLACEABLE_ROLES: &[&str] = &["verifier", "scout", "implementer"];

/// `advance_lifecycle.action` enum values (spec §4.G table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    Close,
    Block,
    Advance,
}

/// Default and minimum `wait_for_agent.timeoutMs` (spec §4.G table).
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 60_000;
pub const MIN_WAIT_TIMEOUT_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq)]
pub struct TasksRequestMsg {
    pub action: String,
    pub params: Value,
    pub default_task_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvanceLifecycleMsg {
    pub agent_type: String,
    pub task_id: String,
    pub action: LifecycleAction,
    pub target: Option<String>,
    pub message: Option<String>,
    pub reason: Option<String>,
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComplaintMsg {
    pub files: Vec<String>,
    pub reason: String,
    pub complainant: String,
}

/// A validated, normalized control-plane message.
#[derive(Debug, Clone, PartialEq)]
pub enum IpcMessage {
    Wake,
    StartTasks { count: u64 },
    TasksRequest(TasksRequestMsg),
    AdvanceLifecycle(AdvanceLifecycleMsg),
    Broadcast { message: String },
    InterruptAgent { task_id: String, message: String },
    SteerAgent { task_id: String, message: String },
    ReplaceAgent { role: String, task_id: String, context: Option<String> },
    StopAgentsForTask { task_id: String, include_verifier: bool, wait_for_completion: bool },
    Complain(ComplaintMsg),
    RevokeComplaint(ComplaintMsg),
    WaitForAgent { agent_id: String, timeout_ms: u64 },
    ListActiveAgents,
    ListTaskAgents { task_id: String },
    ReadMessageHistory { agent_id: String, task_id: Option<String>, limit: Option<usize> },
    PendingSideEffects { task_id: String },
    ApproveSideEffects { task_id: String },
    RejectSideEffects { task_id: String },
}

/// `tasks_request.action` values the daemon knows how to dispatch (spec §4.G).
pub const KNOWN_TASK_ACTIONS: &[&str] = &[
    "ready",
    "list",
    "show",
    "create",
    "update",
    "close",
    "comment_add",
    "comments",
    "search",
    "query",
    "dep_tree",
    "activity",
    "types",
    "delete",
];

fn get_str(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}

fn get_trimmed(value: &Value, field: &str) -> Option<String> {
    get_str(value, field).map(|s| s.trim().to_string())
}

fn get_bool(value: &Value, field: &str, default: bool) -> bool {
    value.get(field).and_then(Value::as_bool).unwrap_or(default)
}

/// Parse one newline-delimited JSON line into a validated [`IpcMessage`].
///
/// Non-JSON input, or JSON missing a string `type`, degrades to a bare
/// [`IpcMessage::Wake`] (spec §4.G "Transport").
pub fn parse(line: &str) -> Result<IpcMessage, IpcError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(IpcMessage::Wake);
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(_) => return Ok(IpcMessage::Wake),
    };

    let ty = match value.get("type").and_then(Value::as_str) {
        Some(t) => t,
        None => return Ok(IpcMessage::Wake),
    };

    match ty {
        "wake" => Ok(IpcMessage::Wake),

        "start_tasks" => {
            let count = match value.get("count") {
                None | Some(Value::Null) => 1,
                Some(v) => {
                    let n = v.as_f64().ok_or_else(|| IpcError::Validation("start_tasks.count must be a finite number".into()))?;
                    if !n.is_finite() {
                        return Err(IpcError::Validation("start_tasks.count must be a finite number".into()));
                    }
                    (n.trunc().max(0.0)) as u64
                }
            };
            Ok(IpcMessage::StartTasks { count })
        }

        "tasks_request" => {
            let action = get_str(&value, "action").ok_or_else(|| IpcError::Validation("tasks_request.action is required".into()))?;
            if !KNOWN_TASK_ACTIONS.contains(&action.as_str()) {
                return Err(IpcError::Validation(format!(
                    "tasks_request: unknown action \"{action}\". Expected one of: {}",
                    KNOWN_TASK_ACTIONS.join(", ")
                )));
            }
            validate_task_action_fields(&action, value.get("params").unwrap_or(&Value::Null))?;
            Ok(IpcMessage::TasksRequest(TasksRequestMsg {
                action,
                params: value.get("params").cloned().unwrap_or(Value::Null),
                default_task_id: get_str(&value, "defaultTaskId"),
            }))
        }

        "advance_lifecycle" => {
            let agent_type = get_str(&value, "agentType").ok_or_else(|| IpcError::Validation("advance_lifecycle.agentType is required".into()))?;
            let task_id = get_str(&value, "taskId").ok_or_else(|| IpcError::Validation("advance_lifecycle.taskId is required".into()))?;
            let action_str = get_str(&value, "action").ok_or_else(|| IpcError::Validation("advance_lifecycle.action is required".into()))?;
            let action = match action_str.as_str() {
                "close" => LifecycleAction::Close,
                "block" => LifecycleAction::Block,
                "advance" => LifecycleAction::Advance,
                other => {
                    return Err(IpcError::Validation(format!(
                        "advance_lifecycle.action must be one of close, block, advance (got \"{other}\")"
                    )))
                }
            };
            let target = get_str(&value, "target");
            if action == LifecycleAction::Advance && target.as_deref().unwrap_or("").is_empty() {
                return Err(IpcError::Validation("advance_lifecycle.target is required when action=advance".into()));
            }
            Ok(IpcMessage::AdvanceLifecycle(AdvanceLifecycleMsg {
                agent_type,
                task_id,
                action,
                target,
                message: get_str(&value, "message"),
                reason: get_str(&value, "reason"),
                agent_id: get_str(&value, "agentId"),
            }))
        }

        "broadcast" => {
            let message = get_trimmed(&value, "message").unwrap_or_default();
            if message.is_empty() {
                return Err(IpcError::Validation("broadcast.message must be non-empty".into()));
            }
            Ok(IpcMessage::Broadcast { message })
        }

        "interrupt_agent" => {
            let task_id = get_str(&value, "taskId").ok_or_else(|| IpcError::Validation("interrupt_agent.taskId is required".into()))?;
            let message = get_str(&value, "message").unwrap_or_default();
            Ok(IpcMessage::InterruptAgent { task_id, message })
        }

        "steer_agent" => {
            let task_id = get_trimmed(&value, "taskId").unwrap_or_default();
            let message = get_trimmed(&value, "message").unwrap_or_default();
            if task_id.is_empty() || message.is_empty() {
                return Err(IpcError::Validation("steer_agent requires non-empty taskId and message".into()));
            }
            Ok(IpcMessage::SteerAgent { task_id, message })
        }

        "replace_agent" => {
            let role = get_str(&value, "role").ok_or_else(|| IpcError::Validation("replace_agent.role is required".into()))?;
            if !REPLACEABLE_ROLES.contains(&role.as_str()) {
                return Err(IpcError::Validation(format!(
                    "replace_agent.role must be one of {} (got \"{role}\")",
                    REPLACEABLE_ROLES.join(", ")
                )));
            }
            let task_id = get_str(&value, "taskId").ok_or_else(|| IpcError::Validation("replace_agent.taskId is required".into()))?;
            Ok(IpcMessage::ReplaceAgent { role, task_id, context: get_str(&value, "context") })
        }

        "stop_agents_for_task" => {
            let task_id = get_str(&value, "taskId").ok_or_else(|| IpcError::Validation("stop_agents_for_task.taskId is required".into()))?;
            Ok(IpcMessage::StopAgentsForTask {
                task_id,
                include_verifier: get_bool(&value, "includeVerifier", false),
                wait_for_completion: get_bool(&value, "waitForCompletion", false),
            })
        }

        "complain" | "revoke_complaint" => {
            let files: Vec<String> = value
                .get("files")
                .and_then(Value::as_array)
                .map(|arr| arr.iter().filter_map(Value::as_str).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
                .unwrap_or_default();
            let reason = get_trimmed(&value, "reason").unwrap_or_default();
            let complainant = get_trimmed(&value, "complainant").unwrap_or_default();
            let msg = ComplaintMsg { files, reason, complainant };
            if ty == "complain" {
                Ok(IpcMessage::Complain(msg))
            } else {
                Ok(IpcMessage::RevokeComplaint(msg))
            }
        }

        "wait_for_agent" => {
            let agent_id = get_str(&value, "agentId").ok_or_else(|| IpcError::Validation("wait_for_agent.agentId is required".into()))?;
            let timeout_ms = match value.get("timeoutMs").and_then(Value::as_u64) {
                Some(ms) => ms.max(MIN_WAIT_TIMEOUT_MS),
                None => DEFAULT_WAIT_TIMEOUT_MS,
            };
            Ok(IpcMessage::WaitForAgent { agent_id, timeout_ms })
        }

        "list_active_agents" => Ok(IpcMessage::ListActiveAgents),

        "list_task_agents" => {
            let task_id = get_trimmed(&value, "taskId").unwrap_or_default();
            if task_id.is_empty() {
                return Err(IpcError::Validation("list_task_agents.taskId is required".into()));
            }
            Ok(IpcMessage::ListTaskAgents { task_id })
        }

        "read_message_history" => {
            let agent_id = get_str(&value, "agentId").ok_or_else(|| IpcError::Validation("read_message_history.agentId is required".into()))?;
            let limit = value.get("limit").and_then(Value::as_u64).map(|n| n as usize);
            Ok(IpcMessage::ReadMessageHistory { agent_id, task_id: get_str(&value, "taskId"), limit })
        }

        "pending_side_effects" => {
            let task_id = get_trimmed(&value, "taskId").unwrap_or_default();
            if task_id.is_empty() {
                return Err(IpcError::Validation("pending_side_effects.taskId is required".into()));
            }
            Ok(IpcMessage::PendingSideEffects { task_id })
        }

        "approve_side_effects" => {
            let task_id = get_trimmed(&value, "taskId").unwrap_or_default();
            if task_id.is_empty() {
                return Err(IpcError::Validation("approve_side_effects.taskId is required".into()));
            }
            Ok(IpcMessage::ApproveSideEffects { task_id })
        }

        "reject_side_effects" => {
            let task_id = get_trimmed(&value, "taskId").unwrap_or_default();
            if task_id.is_empty() {
                return Err(IpcError::Validation("reject_side_effects.taskId is required".into()));
            }
            Ok(IpcMessage::RejectSideEffects { task_id })
        }

        other => Err(IpcError::Validation(format!(
            "Unknown IPC message type \"{other}\". Expected one of: {}",
            KNOWN_TYPES.join(", ")
        ))),
    }
}

fn validate_task_action_fields(action: &str, params: &Value) -> Result<(), IpcError> {
    let field = |name: &str| params.get(name).and_then(Value::as_str).map(str::to_string);
    match action {
        "show" | "update" | "close" | "comment_add" | "dep_tree" | "delete" => {
            if field("id").unwrap_or_default().is_empty() {
                return Err(IpcError::Validation(format!("id required for {action}")));
            }
        }
        "create" => {
            if field("title").unwrap_or_default().is_empty() {
                return Err(IpcError::Validation("title required for create".into()));
            }
        }
        "search" => {
            if field("query").unwrap_or_default().is_empty() {
                return Err(IpcError::Validation("query required for search".into()));
            }
        }
        "query" => {
            if field("query").unwrap_or_default().is_empty() {
                return Err(IpcError::Validation("query required for query".into()));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Parsed `list` flag tuple (spec §4.G "tasks_request actions").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFlags {
    pub all: bool,
    pub status: Option<String>,
    pub issue_type: Option<String>,
    pub limit: Option<usize>,
}

/// Parse the well-known `list` flag tuple out of a raw argv-like slice.
pub fn parse_list_flags(args: &[String]) -> ListFlags {
    let mut flags = ListFlags::default();
    for arg in args {
        if arg == "--all" {
            flags.all = true;
        } else if let Some(rest) = arg.strip_prefix("--status=") {
            flags.status = Some(rest.to_string());
        } else if let Some(rest) = arg.strip_prefix("--type=") {
            flags.issue_type = Some(rest.to_string());
        } else if let Some(rest) = arg.strip_prefix("--limit=") {
            flags.limit = rest.parse::<usize>().ok();
        }
    }
    flags
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
