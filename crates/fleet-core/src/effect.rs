//! Side effects produced by an agent's dispatch, queued per-task in
//! interactive mode (spec §3 "Side-effect queue", §4.F).

use serde::Serialize;

use crate::ids::TaskId;
use crate::role::RoleId;
use crate::task::TaskStatus;

/// An outward mutation produced by dispatching a role against a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SideEffect {
    PostComment { task_id: TaskId, text: String },
    UpdateTaskStatus { task_id: TaskId, status: TaskStatus },
    SpawnFollowUp { role: RoleId, task_id: TaskId, context: Option<String> },
}

impl SideEffect {
    /// Application order for `approveSideEffects` (spec §4.F, §8 property 7):
    /// comments, then status updates, then follow-up spawns.
    pub fn apply_order_rank(&self) -> u8 {
        match self {
            SideEffect::PostComment { .. } => 0,
            SideEffect::UpdateTaskStatus { .. } => 1,
            SideEffect::SpawnFollowUp { .. } => 2,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        match self {
            SideEffect::PostComment { task_id, .. } => task_id,
            SideEffect::UpdateTaskStatus { task_id, .. } => task_id,
            SideEffect::SpawnFollowUp { task_id, .. } => task_id,
        }
    }
}

#[cfg(test)]
#[path = "effect_tests.rs"]
mod tests;
