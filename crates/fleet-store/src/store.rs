//! The narrow task-store client contract the core consumes (spec §6).
//!
//! The core never implements a task store; it only calls this trait. Two
//! implementations ship in this crate: [`crate::file_store::FileTaskStore`]
//! for real on-disk use and [`crate::memory::InMemoryTaskStore`] (behind
//! `test-support`) for deterministic tests.

use async_trait::async_trait;
use fleet_core::{Task, TaskId};

use crate::error::StoreError;
use crate::types::{
    ActivityEntry, ActivityOpts, CompactTaskView, CreateTaskInput, DepTreeNode, DepTreeOpts, ListOpts, SearchOpts, StoredAgent,
    StoredMessage, TaskPatch,
};

pub type StoreResult<T> = Result<T, StoreError>;

/// A subscription handle returned by `subscribe`. Dropping it, or calling
/// [`Subscription::unsubscribe`], stops delivery.
pub struct Subscription {
    cancel: Box<dyn FnOnce() + Send>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self { cancel: Box::new(cancel) }
    }

    pub fn unsubscribe(self) {
        (self.cancel)()
    }
}

/// A change notification delivered to `subscribe` listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    TaskChanged(TaskId),
    TaskCreated(TaskId),
}

pub type StoreListener = Box<dyn Fn(&StoreEvent) + Send + Sync>;

/// The task-store client contract consumed by the Scheduler, Lifecycle
/// Engine, IPC handler, and Agent Loop (spec §6).
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// The "ready" view: tasks whose dependencies are satisfied and whose
    /// status is open or in_progress with no assigned agent (spec §4.B).
    async fn ready(&self) -> StoreResult<Vec<Task>>;

    /// `list(flags)` — well-known flag tuple, already parsed (spec §4.G).
    async fn list(&self, opts: &ListOpts) -> StoreResult<Vec<CompactTaskView>>;

    async fn show(&self, id: &TaskId) -> StoreResult<Task>;

    async fn create(&self, input: CreateTaskInput) -> StoreResult<Task>;

    /// Batch creation; optional because not every store backend supports it
    /// atomically (spec §6 `createBatch?`).
    async fn create_batch(&self, _inputs: Vec<CreateTaskInput>) -> StoreResult<Vec<Task>> {
        Err(StoreError::Invalid("create_batch is not supported by this store".into()))
    }

    async fn update(&self, id: &TaskId, patch: TaskPatch) -> StoreResult<Task>;

    async fn close(&self, id: &TaskId, reason: Option<&str>) -> StoreResult<Task>;

    async fn search(&self, query: &str, opts: &SearchOpts) -> StoreResult<Vec<CompactTaskView>>;

    async fn query(&self, expr: &str, args: &[String]) -> StoreResult<Vec<CompactTaskView>>;

    /// Atomically claim a task. Callers swallow `StoreError::AlreadyClaimed`
    /// as a benign scheduling race (spec §4.B).
    async fn claim(&self, id: &TaskId) -> StoreResult<bool>;

    async fn update_status(&self, id: &TaskId, status: fleet_core::TaskStatus) -> StoreResult<Task>;

    async fn add_label(&self, id: &TaskId, label: &str) -> StoreResult<Task>;

    async fn comment(&self, id: &TaskId, text: &str, actor: Option<&str>) -> StoreResult<Task>;

    async fn comments(&self, id: &TaskId) -> StoreResult<Vec<fleet_core::Comment>>;

    async fn dep_tree(&self, id: &TaskId, opts: &DepTreeOpts) -> StoreResult<DepTreeNode>;

    async fn dep_add(&self, id: &TaskId, depends_on: &TaskId) -> StoreResult<Task>;

    async fn types(&self) -> StoreResult<Vec<String>>;

    async fn delete(&self, id: &TaskId) -> StoreResult<()>;

    async fn activity(&self, opts: &ActivityOpts) -> StoreResult<Vec<ActivityEntry>>;

    async fn create_agent(&self, name: &str) -> StoreResult<StoredAgent>;

    async fn set_agent_state(&self, id: &str, state: &str) -> StoreResult<()>;

    async fn heartbeat(&self, id: &str) -> StoreResult<()>;

    async fn set_slot(&self, task_id: &TaskId, agent_id: &str) -> StoreResult<()>;

    async fn clear_slot(&self, task_id: &TaskId) -> StoreResult<()>;

    /// Persisted agents bound to `task_id`, for `list_task_agents`'s
    /// live+persisted merge (spec §4.G). Default: no persisted agents (not
    /// every store backend tracks the slot-to-agent binding durably).
    async fn list_agents_for_task(&self, _task_id: &TaskId) -> StoreResult<Vec<StoredAgent>> {
        Ok(Vec::new())
    }

    async fn read_agent_messages(&self, _agent_id: &str, _limit: Option<usize>) -> StoreResult<Vec<StoredMessage>> {
        Ok(Vec::new())
    }

    async fn record_agent_event(&self, _agent_id: &str, _payload: serde_json::Value) -> StoreResult<()> {
        Ok(())
    }

    async fn record_agent_usage(&self, _agent_id: &str, _usage: serde_json::Value) -> StoreResult<()> {
        Ok(())
    }

    /// Subscribe to store-level change notifications. Default: no-op
    /// subscription (not every backend can push notifications).
    fn subscribe(&self, _listener: StoreListener) -> Subscription {
        Subscription::new(|| {})
    }
}
