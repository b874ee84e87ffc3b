//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::ids::TaskId;
use crate::task::{IssueType, Task, TaskStatus};
use std::collections::BTreeSet;

/// Minimal builder for a test [`Task`] with sane defaults.
pub struct TaskBuilder {
    id: String,
    priority: Option<i64>,
    status: TaskStatus,
    labels: Vec<String>,
    depends_on: BTreeSet<TaskId>,
}

impl TaskBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), priority: None, status: TaskStatus::Open, labels: vec![], depends_on: BTreeSet::new() }
    }

    pub fn priority(mut self, p: i64) -> Self {
        self.priority = Some(p);
        self
    }

    pub fn status(mut self, s: TaskStatus) -> Self {
        self.status = s;
        self
    }

    pub fn labels(mut self, labels: &[&str]) -> Self {
        self.labels = labels.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn depends_on(mut self, ids: &[&str]) -> Self {
        self.depends_on = ids.iter().map(|s| TaskId::new(*s)).collect();
        self
    }

    pub fn build(self) -> Task {
        Task {
            id: TaskId::new(self.id),
            title: "test task".to_string(),
            description: String::new(),
            status: self.status,
            priority: self.priority,
            issue_type: IssueType::Task,
            labels: self.labels,
            assignee: None,
            depends_on_ids: self.depends_on,
            references: BTreeSet::new(),
            comments: vec![],
            created_at: "0".to_string(),
            updated_at: "0".to_string(),
        }
    }
}

/// Proptest strategies for core types.
#[cfg(feature = "proptest")]
pub mod strategies {
    use crate::ids::TaskId;
    use proptest::prelude::*;

    pub fn arb_task_id() -> impl Strategy<Value = TaskId> {
        "(task|t)-[0-9]{1,4}".prop_map(TaskId::new)
    }

    pub fn arb_priority() -> impl Strategy<Value = Option<i64>> {
        prop_oneof![Just(None), (0i64..=4).prop_map(Some)]
    }
}
