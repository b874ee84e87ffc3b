//! Replace-agent policy — spec §4.E, triggered by IPC `replace_agent`.

use fleet_core::{RoleId, TaskId, TaskStatus};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplaceError {
    #[error("loop is paused")]
    LoopPaused,
    #[error("task {0} does not exist")]
    TaskNotFound(TaskId),
    #[error("task {0} is closed")]
    TaskClosed(TaskId),
    #[error("role {0} is not replaceable")]
    RoleNotReplaceable(RoleId),
}

/// Plan produced by a valid `replace_agent` request (spec §4.E "Replace-agent policy").
#[derive(Debug, Clone, PartialEq)]
pub struct ReplacePlan {
    pub task_id: TaskId,
    pub role: RoleId,
    pub context: Option<String>,
    /// Set when the task was `blocked` and must transition to `in_progress` first.
    pub unblock_first: bool,
}

/// Roles `replace_agent` may request (spec §4.G `REPLACEABLE_ROLES`).
pub fn is_replaceable(role: &RoleId) -> bool {
    matches!(role, RoleId::Scout | RoleId::Implementer | RoleId::Verifier)
}

/// Validate and build a replace plan (spec §4.E preconditions): loop not
/// paused; task exists; task status ≠ closed; role in the replaceable set.
pub fn plan_replace(
    loop_paused: bool,
    task_id: TaskId,
    task_status: Option<TaskStatus>,
    role: RoleId,
    context: Option<String>,
) -> Result<ReplacePlan, ReplaceError> {
    if loop_paused {
        return Err(ReplaceError::LoopPaused);
    }
    let status = task_status.ok_or_else(|| ReplaceError::TaskNotFound(task_id.clone()))?;
    if status.is_closed() {
        return Err(ReplaceError::TaskClosed(task_id));
    }
    if !is_replaceable(&role) {
        return Err(ReplaceError::RoleNotReplaceable(role));
    }
    Ok(ReplacePlan { unblock_first: status == TaskStatus::Blocked, task_id, role, context })
}

#[cfg(test)]
#[path = "replace_tests.rs"]
mod tests;
