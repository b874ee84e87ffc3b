//! Scheduler — spec §4.B.
//!
//! Picks the next eligible task(s) given concurrency (via [`ActiveAgents`]),
//! dependency closure, and label conflicts (via [`crate::conflict`]).
//! Generic over [`fleet_store::TaskStore`] so it never depends on the
//! daemon's registry or IPC types directly.

use std::cmp::Ordering;
use std::sync::Arc;

use fleet_core::{natural_cmp, IssueType, Task, TaskId, TaskStatus};
use fleet_store::{ListOpts, StoreError, TaskStore};
use thiserror::Error;

use crate::conflict::{check_label_conflicts, InProgressLabels};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Concurrency view the scheduler needs from the Agent Registry (spec §4.C),
/// kept as a trait so `fleet-engine` never depends on `fleet-daemon`.
pub trait ActiveAgents: Send + Sync {
    /// Whether any non-terminal agent is currently bound to this task.
    fn has_active_agent_for_task(&self, task_id: &TaskId) -> bool;
}

/// An `ActiveAgents` that reports nothing active — useful for tests and for
/// the startup reconciliation pass, which deliberately ignores concurrency.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoActiveAgents;

impl ActiveAgents for NoActiveAgents {
    fn has_active_agent_for_task(&self, _task_id: &TaskId) -> bool {
        false
    }
}

pub struct Scheduler<S: TaskStore> {
    store: Arc<S>,
}

impl<S: TaskStore> Scheduler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// `getNextTasks(count)` — spec §4.B.
    pub async fn get_next_tasks(&self, count: usize, active: &dyn ActiveAgents) -> SchedulerResult<Vec<Task>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let ready = self.store.ready().await?;
        let in_progress = self.in_progress_labels().await?;

        let mut candidates = Vec::new();
        for task in ready {
            if task.issue_type != IssueType::Task {
                continue;
            }
            if active.has_active_agent_for_task(&task.id) {
                continue;
            }
            if !self.dependencies_closed(&task).await? {
                continue;
            }
            let refs: Vec<InProgressLabels<'_>> = in_progress.iter().map(|(id, labels)| InProgressLabels { id, labels }).collect();
            if check_label_conflicts(&task.labels, &refs).conflicting {
                continue;
            }
            candidates.push(task);
        }

        candidates.sort_by(|a, b| tie_break(a, b));
        candidates.truncate(count);
        Ok(candidates)
    }

    /// `getInProgressTasksWithoutAgent(count)` — spec §4.B, used for startup
    /// reconciliation (spec §4.H).
    pub async fn get_in_progress_tasks_without_agent(&self, count: usize, active: &dyn ActiveAgents) -> SchedulerResult<Vec<Task>> {
        let mut views = self.store.list(&ListOpts { include_closed: false, status: Some(TaskStatus::InProgress), ..Default::default() }).await?;
        views.sort_by(|a, b| natural_cmp(&a.id, &b.id));
        let mut out = Vec::new();
        for view in views {
            if out.len() >= count {
                break;
            }
            let id = TaskId::new(view.id);
            if active.has_active_agent_for_task(&id) {
                continue;
            }
            out.push(self.store.show(&id).await?);
        }
        Ok(out)
    }

    /// `findTasksUnblockedBy(closedTaskId)` — spec §4.B.
    pub async fn find_tasks_unblocked_by(&self, closed_task_id: &TaskId) -> SchedulerResult<Vec<Task>> {
        let views = self.store.list(&ListOpts { include_closed: false, ..Default::default() }).await?;
        let mut unblocked = Vec::new();
        for view in views {
            if view.status != TaskStatus::Open && view.status != TaskStatus::Blocked {
                continue;
            }
            let task = self.store.show(&TaskId::new(view.id)).await?;
            if !task.depends_on_ids.contains(closed_task_id) {
                continue;
            }
            if self.dependencies_closed(&task).await? {
                unblocked.push(task);
            }
        }
        Ok(unblocked)
    }

    /// `tryClaim(taskId)` — spec §4.B. Swallows "already claimed" races.
    pub async fn try_claim(&self, task_id: &TaskId) -> SchedulerResult<bool> {
        match self.store.claim(task_id).await {
            Ok(claimed) => Ok(claimed),
            Err(StoreError::AlreadyClaimed(_)) => Ok(false),
            Err(StoreError::Other(message)) if fleet_core::classify_store_error(&message) == Some(fleet_core::StoreErrorKind::AlreadyClaimed) => {
                Ok(false)
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn dependencies_closed(&self, task: &Task) -> SchedulerResult<bool> {
        for dep in &task.depends_on_ids {
            let dep_task = self.store.show(dep).await?;
            if !dep_task.status.is_closed() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn in_progress_labels(&self) -> SchedulerResult<Vec<(String, Vec<String>)>> {
        let views = self.store.list(&ListOpts { include_closed: false, status: Some(TaskStatus::InProgress), ..Default::default() }).await?;
        let mut out = Vec::with_capacity(views.len());
        for view in views {
            let task = self.store.show(&TaskId::new(view.id)).await?;
            out.push((task.id.as_str().to_string(), task.labels));
        }
        Ok(out)
    }
}

/// Tie-break rule (spec §4.B): `priority` ascending (absent sorts as
/// `+infinity`), then id natural-number-aware ascending.
fn tie_break(a: &Task, b: &Task) -> Ordering {
    a.ordering_priority().cmp(&b.ordering_priority()).then_with(|| natural_cmp(a.id.as_str(), b.id.as_str()))
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "scheduler_property_tests.rs"]
mod property_tests;
