//! Agent record data model — spec §3.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::ids::{AgentLocalId, TaskId};
use crate::role::RoleId;

/// Lifecycle status of a supervised agent record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRecordStatus {
    Running,
    Working,
    Paused,
    Done,
    Stopped,
    Aborted,
    Failed,
    Dead,
}

impl AgentRecordStatus {
    /// Terminal statuses forbid further mutation of `role`/`taskId` (spec §3).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AgentRecordStatus::Done
                | AgentRecordStatus::Stopped
                | AgentRecordStatus::Aborted
                | AgentRecordStatus::Failed
                | AgentRecordStatus::Dead
        )
    }
}

crate::simple_display! {
    AgentRecordStatus {
        Running => "running",
        Working => "working",
        Paused => "paused",
        Done => "done",
        Stopped => "stopped",
        Aborted => "aborted",
        Failed => "failed",
        Dead => "dead",
    }
}

/// Monotonically-accumulating token/cost usage for an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input: u64,
    pub output: u64,
    pub cache_read: u64,
    pub cache_write: u64,
    pub total_tokens: u64,
    pub cost: f64,
}

/// A single usage delta computed from one `message_end` event (spec §4.D.3).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UsageDelta {
    pub input: u64,
    pub output: u64,
    pub cache_read: u64,
    pub cache_write: u64,
    pub total_tokens: Option<u64>,
    pub cost: f64,
}

impl Usage {
    /// Apply a delta, accumulating monotonically. `total_tokens` defaults to
    /// the sum of the four channels when the delta doesn't carry one.
    pub fn apply_delta(&mut self, delta: UsageDelta) {
        self.input += delta.input;
        self.output += delta.output;
        self.cache_read += delta.cache_read;
        self.cache_write += delta.cache_write;
        let total = delta
            .total_tokens
            .unwrap_or(delta.input + delta.output + delta.cache_read + delta.cache_write);
        self.total_tokens += total;
        self.cost += delta.cost;
    }
}

/// One event appended to an agent's bounded ring buffer. Payload shape
/// mirrors the wire-level `AgentEvent` but is kept generic here (`serde_json::Value`)
/// so the core crate doesn't depend on the daemon's RPC event schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEventRecord {
    pub seq: u64,
    pub payload: serde_json::Value,
}

/// Fixed-capacity ring buffer; oldest entries are evicted first (spec §4.C).
#[derive(Debug, Clone)]
pub struct EventRing {
    capacity: usize,
    events: VecDeque<AgentEventRecord>,
    next_seq: u64,
}

pub const DEFAULT_EVENT_RING: usize = 1024;

impl EventRing {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), events: VecDeque::new(), next_seq: 0 }
    }

    pub fn push(&mut self, payload: serde_json::Value) {
        if self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(AgentEventRecord { seq: self.next_seq, payload });
        self.next_seq += 1;
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentEventRecord> {
        self.events.iter()
    }

    pub fn tail(&self, limit: usize) -> Vec<AgentEventRecord> {
        let skip = self.events.len().saturating_sub(limit);
        self.events.iter().skip(skip).cloned().collect()
    }
}

impl Default for EventRing {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_RING)
    }
}

/// An in-memory, supervised agent subprocess record (spec §3).
#[derive(Debug, Clone)]
pub struct AgentRecord {
    pub id: AgentLocalId,
    /// Id persisted in the external task store (distinct from `id`).
    pub tasks_agent_id: Option<String>,
    pub role: RoleId,
    pub task_id: Option<TaskId>,
    pub status: AgentRecordStatus,
    pub spawned_at_ms: u64,
    pub last_activity_ms: u64,
    pub usage: Usage,
    pub context_tokens: u64,
    pub context_window: Option<u64>,
    pub compaction_count: u32,
    pub session_id: Option<String>,
    pub events: EventRing,
}

impl AgentRecord {
    pub fn new(id: AgentLocalId, role: RoleId, task_id: Option<TaskId>, spawned_at_ms: u64, ring_capacity: usize) -> Self {
        Self {
            id,
            tasks_agent_id: None,
            role,
            task_id,
            status: AgentRecordStatus::Running,
            spawned_at_ms,
            last_activity_ms: spawned_at_ms,
            usage: Usage::default(),
            context_tokens: 0,
            context_window: None,
            compaction_count: 0,
            session_id: None,
            events: EventRing::new(ring_capacity),
        }
    }

    /// Whether mutating `role`/`task_id` is still permitted (spec §3 invariant).
    pub fn mutable(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[cfg(test)]
#[path = "agent_record_tests.rs"]
mod tests;
