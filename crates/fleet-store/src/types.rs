//! Request/response shapes for the [`crate::TaskStore`] contract (spec §6).

use fleet_core::{Task, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};

/// Input for `create(title, description?, priority?, opts)` (spec §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTaskInput {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<i64>,
    pub labels: Vec<String>,
    pub depends_on_ids: Vec<String>,
    pub issue_type: Option<String>,
}

/// A partial update applied by `update(id, patch)`. `None` fields are left
/// untouched; nested `Option<Option<T>>` would be needed to clear a field,
/// but clearing `assignee`/`priority` via patch isn't required, so a
/// single-level `Option` is sufficient here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<i64>,
    pub assignee: Option<String>,
    pub labels: Option<Vec<String>>,
    pub depends_on_ids: Option<Vec<String>>,
}

/// Options accompanying `list(flags)` once parsed (spec §4.G "list" action).
#[derive(Debug, Clone, Default)]
pub struct ListOpts {
    pub include_closed: bool,
    pub status: Option<TaskStatus>,
    pub issue_type: Option<String>,
    pub limit: Option<usize>,
}

/// The compact 8-field projection returned by `tasks_request list` (spec
/// §4.G). `schema_version` is an invariant eighth key so every list row
/// carries a stable field count regardless of task shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompactTaskView {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub priority: Option<i64>,
    pub assignee: Option<String>,
    pub dependency_count: usize,
    pub issue_type: String,
    pub schema_version: u32,
}

impl CompactTaskView {
    pub fn from_task(task: &Task) -> Self {
        Self {
            id: task.id.as_str().to_string(),
            title: task.title.clone(),
            status: task.status,
            priority: task.priority,
            assignee: task.assignee.clone(),
            dependency_count: task.depends_on_ids.len(),
            issue_type: task.issue_type.to_string(),
            schema_version: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchOpts {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct DepTreeOpts {
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepTreeNode {
    pub id: String,
    pub status: TaskStatus,
    pub children: Vec<DepTreeNode>,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityOpts {
    pub since: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEntry {
    pub task_id: String,
    pub kind: String,
    pub detail: String,
    pub at: String,
}

/// Persisted agent record surfaced through the store (spec §3 "agent
/// record"), distinct from the in-memory `fleet_core::AgentRecord` the
/// daemon's registry owns. The store only ever sees the durable fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredAgent {
    pub id: String,
    pub name: String,
    pub state: String,
    pub task_id: Option<TaskId>,
    pub hook_task: Option<String>,
    pub usage_snapshot: serde_json::Value,
    pub last_heartbeat: Option<String>,
}

/// One recorded agent message, as returned by `readAgentMessages` (spec §4.C).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredMessage {
    pub seq: u64,
    pub payload: serde_json::Value,
}
