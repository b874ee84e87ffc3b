//! Task (issue) data model — spec §3.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ids::TaskId;

/// Status of a task. `Closed` is terminal and cannot be reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Blocked,
    Closed,
    Done,
    Dead,
    Failed,
}

impl TaskStatus {
    /// `Closed` is the only truly terminal-and-immutable status (spec §3).
    pub fn is_closed(self) -> bool {
        matches!(self, TaskStatus::Closed)
    }

    /// Statuses excluded from default `tasks_request list` visibility (spec §4.G).
    pub fn is_default_hidden(self) -> bool {
        matches!(
            self,
            TaskStatus::Closed | TaskStatus::Done | TaskStatus::Dead | TaskStatus::Failed
        )
    }
}

crate::simple_display! {
    TaskStatus {
        Open => "open",
        InProgress => "in_progress",
        Blocked => "blocked",
        Closed => "closed",
        Done => "done",
        Dead => "dead",
        Failed => "failed",
    }
}

/// What a task-store entry represents. Only `Task` is workload; `Agent`
/// entries are persisted agent records surfaced through the same listing
/// API (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Task,
    Agent,
}

crate::simple_display! {
    IssueType {
        Task => "task",
        Agent => "agent",
    }
}

/// A comment attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub text: String,
    pub created_at: String,
}

/// A unit of work, persisted by the external task store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    /// Lower is higher priority. Absent priority sorts as `+infinity`
    /// (represented here by `None`).
    pub priority: Option<i64>,
    pub issue_type: IssueType,
    /// Ordered set of labels; insertion order preserved, duplicates ignored.
    pub labels: Vec<String>,
    pub assignee: Option<String>,
    pub depends_on_ids: BTreeSet<TaskId>,
    pub references: BTreeSet<TaskId>,
    pub comments: Vec<Comment>,
    pub created_at: String,
    pub updated_at: String,
}

impl Task {
    /// Priority used for ordering: absent priority sorts as `+infinity`.
    pub fn ordering_priority(&self) -> i64 {
        self.priority.unwrap_or(i64::MAX)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
