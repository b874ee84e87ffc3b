//! Agent Registry — spec §4.C.
//!
//! Holds owned [`AgentRecord`]s in an arena-like map keyed by local id,
//! with a secondary index for `tasksAgentId` (spec §9 "Agent registry
//! graph"). Reads that return snapshots copy out of the lock; no I/O runs
//! while the lock is held.

use std::collections::HashMap;

use fleet_core::{AgentLocalId, AgentRecord, AgentRecordStatus, RoleId, TaskId, UsageDelta};
use fleet_engine::ActiveAgents;
use parking_lot::Mutex;
use thiserror::Error;

mod history;
mod summary;

pub use history::{pair_tool_calls, HistoryResolution, MessageHistory, ToolCall};
pub use summary::ActiveSummary;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("agent {0} not found")]
    NotFound(String),
    #[error("agent {agent_id} is bound to task {actual}, not {expected}")]
    TaskMismatch { agent_id: String, expected: String, actual: String },
    #[error("agent {0} is terminal and cannot be mutated")]
    Terminal(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Default)]
struct Inner {
    records: HashMap<AgentLocalId, AgentRecord>,
    by_tasks_agent_id: HashMap<String, AgentLocalId>,
}

/// In-memory supervisor state for every agent subprocess the daemon has
/// spawned this run. Shared read-mostly; mutated only through these
/// synchronized methods (spec §5 "Registry is protected by a mutex").
#[derive(Default)]
pub struct Registry {
    inner: Mutex<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `register(record)` — spec §8 property 2: registering twice with the
    /// same id replaces the prior record and re-indexes its tasksAgentId.
    pub fn register(&self, record: AgentRecord) {
        let mut inner = self.inner.lock();
        if let Some(tasks_agent_id) = &record.tasks_agent_id {
            inner.by_tasks_agent_id.insert(tasks_agent_id.clone(), record.id.clone());
        }
        inner.records.insert(record.id.clone(), record);
    }

    pub fn get(&self, local_id: &AgentLocalId) -> Option<AgentRecord> {
        self.inner.lock().records.get(local_id).cloned()
    }

    pub fn get_by_tasks_agent_id(&self, id: &str) -> Option<AgentRecord> {
        let inner = self.inner.lock();
        let local_id = inner.by_tasks_agent_id.get(id)?;
        inner.records.get(local_id).cloned()
    }

    pub fn get_by_task(&self, task_id: &TaskId) -> Vec<AgentRecord> {
        self.inner.lock().records.values().filter(|r| r.task_id.as_ref() == Some(task_id)).cloned().collect()
    }

    /// `getActiveByTask(taskId)` — excludes terminal statuses.
    pub fn get_active_by_task(&self, task_id: &TaskId) -> Vec<AgentRecord> {
        self.inner
            .lock()
            .records
            .values()
            .filter(|r| r.task_id.as_ref() == Some(task_id) && !r.status.is_terminal())
            .cloned()
            .collect()
    }

    pub fn get_active(&self) -> Vec<AgentRecord> {
        self.inner.lock().records.values().filter(|r| !r.status.is_terminal()).cloned().collect()
    }

    pub fn list_active_summaries(&self) -> Vec<ActiveSummary> {
        self.inner.lock().records.values().filter(|r| !r.status.is_terminal()).map(ActiveSummary::from_record).collect()
    }

    /// `pushEvent(localId, event)` — ring buffer, oldest dropped (spec §8 property 3).
    pub fn push_event(&self, local_id: &AgentLocalId, event: serde_json::Value) -> RegistryResult<()> {
        let mut inner = self.inner.lock();
        let record = inner.records.get_mut(local_id).ok_or_else(|| RegistryError::NotFound(local_id.to_string()))?;
        record.events.push(event);
        Ok(())
    }

    pub fn set_status(&self, local_id: &AgentLocalId, status: AgentRecordStatus) -> RegistryResult<()> {
        let mut inner = self.inner.lock();
        let record = inner.records.get_mut(local_id).ok_or_else(|| RegistryError::NotFound(local_id.to_string()))?;
        record.status = status;
        Ok(())
    }

    pub fn apply_usage_delta(&self, local_id: &AgentLocalId, delta: UsageDelta) -> RegistryResult<()> {
        let mut inner = self.inner.lock();
        let record = inner.records.get_mut(local_id).ok_or_else(|| RegistryError::NotFound(local_id.to_string()))?;
        record.usage.apply_delta(delta);
        Ok(())
    }

    pub fn set_context_tokens(&self, local_id: &AgentLocalId, context_tokens: u64) -> RegistryResult<()> {
        let mut inner = self.inner.lock();
        let record = inner.records.get_mut(local_id).ok_or_else(|| RegistryError::NotFound(local_id.to_string()))?;
        record.context_tokens = context_tokens;
        Ok(())
    }

    pub fn set_context_window(&self, local_id: &AgentLocalId, context_window: u64) -> RegistryResult<()> {
        let mut inner = self.inner.lock();
        let record = inner.records.get_mut(local_id).ok_or_else(|| RegistryError::NotFound(local_id.to_string()))?;
        if record.context_window.is_none() {
            record.context_window = Some(context_window);
        }
        Ok(())
    }

    pub fn increment_compaction_count(&self, local_id: &AgentLocalId) -> RegistryResult<()> {
        let mut inner = self.inner.lock();
        let record = inner.records.get_mut(local_id).ok_or_else(|| RegistryError::NotFound(local_id.to_string()))?;
        record.compaction_count += 1;
        Ok(())
    }

    pub fn touch_last_activity(&self, local_id: &AgentLocalId, epoch_ms: u64) -> RegistryResult<()> {
        let mut inner = self.inner.lock();
        let record = inner.records.get_mut(local_id).ok_or_else(|| RegistryError::NotFound(local_id.to_string()))?;
        record.last_activity_ms = epoch_ms;
        Ok(())
    }

    /// Remove terminal agent records older than a retention cutoff. Terminal
    /// records are otherwise kept indefinitely so late events/UI can still
    /// resolve them (spec §3 "Agent record" invariant).
    pub fn prune_terminal_before(&self, cutoff_epoch_ms: u64) -> usize {
        let mut inner = self.inner.lock();
        let doomed: Vec<AgentLocalId> = inner
            .records
            .values()
            .filter(|r| r.status.is_terminal() && r.last_activity_ms < cutoff_epoch_ms)
            .map(|r| r.id.clone())
            .collect();
        for id in &doomed {
            if let Some(record) = inner.records.remove(id) {
                if let Some(tasks_agent_id) = record.tasks_agent_id {
                    inner.by_tasks_agent_id.remove(&tasks_agent_id);
                }
            }
        }
        doomed.len()
    }

    /// Resolve a `readMessageHistory` id (local or `tasksAgentId`,
    /// colon-suffixed or not) against this registry's live records (spec
    /// §4.C).
    pub fn resolve_for_history(&self, raw_id: &str) -> Option<AgentRecord> {
        history::resolve_live_agent(raw_id, |id| self.get(id), |id| self.get_by_tasks_agent_id(id))
    }

    /// Resolve a role id against a task, enforcing the task-boundary check
    /// (spec §4.C): if both `agent_id` and a non-empty `task_id` are
    /// supplied, the agent must actually be bound to that task.
    pub fn check_task_boundary(&self, agent_id: &AgentLocalId, task_id: Option<&TaskId>) -> RegistryResult<()> {
        let Some(expected) = task_id else { return Ok(()) };
        let record = self.get(agent_id).ok_or_else(|| RegistryError::NotFound(agent_id.to_string()))?;
        match &record.task_id {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => Err(RegistryError::TaskMismatch {
                agent_id: agent_id.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            }),
            None => Err(RegistryError::TaskMismatch {
                agent_id: agent_id.to_string(),
                expected: expected.to_string(),
                actual: "<none>".to_string(),
            }),
        }
    }
}

/// Adapts the registry to the scheduler's narrow concurrency view
/// (spec §9 "Role polymorphism" dependency direction: `fleet-engine` never
/// depends on `fleet-daemon`, so the daemon implements the trait instead).
impl ActiveAgents for Registry {
    fn has_active_agent_for_task(&self, task_id: &TaskId) -> bool {
        !self.get_active_by_task(task_id).is_empty()
    }
}

/// Roles that occupy a "worker kind" slot for `maxWorkers` accounting
/// (spec §4.H).
pub fn is_worker_kind(role: &RoleId) -> bool {
    matches!(role, RoleId::Implementer | RoleId::Scout)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
