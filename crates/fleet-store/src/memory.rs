//! In-memory [`TaskStore`] test double (spec §6 "test-support" parity with
//! `fleet-core`'s `test-support` feature). Used by the engine/daemon test
//! suites; never used outside `#[cfg(test)]`/this feature.

use async_trait::async_trait;
use fleet_core::{Comment, IssueType, Task, TaskId, TaskStatus};
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::error::StoreError;
use crate::store::{StoreResult, Subscription, TaskStore};
use crate::types::{
    ActivityEntry, ActivityOpts, CompactTaskView, CreateTaskInput, DepTreeNode, DepTreeOpts, ListOpts, SearchOpts, StoredAgent, TaskPatch,
};

#[derive(Default)]
struct Inner {
    tasks: HashMap<String, Task>,
    agents: HashMap<String, StoredAgent>,
    activity: Vec<ActivityEntry>,
    seq: u64,
}

/// An in-memory store. Cheap to construct per test; seed with
/// [`InMemoryTaskStore::with_tasks`] for scheduler/lifecycle tests.
#[derive(Default)]
pub struct InMemoryTaskStore {
    inner: Mutex<Inner>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let store = Self::new();
        let mut inner = store.inner.lock();
        for task in tasks {
            inner.tasks.insert(task.id.as_str().to_string(), task);
        }
        drop(inner);
        store
    }

    pub fn insert_task(&self, task: Task) {
        self.inner.lock().tasks.insert(task.id.as_str().to_string(), task);
    }
}

fn dependencies_closed(tasks: &HashMap<String, Task>, task: &Task) -> bool {
    task.depends_on_ids.iter().all(|dep| tasks.get(dep.as_str()).map(|t| t.status.is_closed()).unwrap_or(false))
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn ready(&self) -> StoreResult<Vec<Task>> {
        let inner = self.inner.lock();
        Ok(inner
            .tasks
            .values()
            .filter(|t| matches!(t.status, TaskStatus::Open | TaskStatus::InProgress) && t.assignee.is_none())
            .filter(|t| dependencies_closed(&inner.tasks, t))
            .cloned()
            .collect())
    }

    async fn list(&self, opts: &ListOpts) -> StoreResult<Vec<CompactTaskView>> {
        let inner = self.inner.lock();
        let default_type_task = !opts.include_closed && opts.issue_type.is_none();
        let mut items: Vec<&Task> = inner
            .tasks
            .values()
            .filter(|t| {
                if let Some(status) = opts.status {
                    t.status == status
                } else if opts.include_closed {
                    true
                } else {
                    !t.status.is_default_hidden()
                }
            })
            .filter(|t| match &opts.issue_type {
                Some(ty) => t.issue_type.to_string() == *ty,
                None if default_type_task => t.issue_type == IssueType::Task,
                None => true,
            })
            .collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let views: Vec<CompactTaskView> = items.iter().map(|t| CompactTaskView::from_task(t)).collect();
        Ok(match opts.limit {
            Some(n) => views.into_iter().take(n).collect(),
            None => views,
        })
    }

    async fn show(&self, id: &TaskId) -> StoreResult<Task> {
        self.inner.lock().tasks.get(id.as_str()).cloned().ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))
    }

    async fn create(&self, input: CreateTaskInput) -> StoreResult<Task> {
        let mut inner = self.inner.lock();
        let seq = inner.seq;
        inner.seq += 1;
        let id = TaskId::new(format!("task-{seq}"));
        let now = chrono::Utc::now().to_rfc3339();
        let task = Task {
            id: id.clone(),
            title: input.title,
            description: input.description.unwrap_or_default(),
            status: TaskStatus::Open,
            priority: input.priority,
            issue_type: if input.issue_type.as_deref() == Some("agent") { IssueType::Agent } else { IssueType::Task },
            labels: input.labels,
            assignee: None,
            depends_on_ids: input.depends_on_ids.into_iter().map(TaskId::new).collect(),
            references: Default::default(),
            comments: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        };
        inner.tasks.insert(id.as_str().to_string(), task.clone());
        Ok(task)
    }

    async fn update(&self, id: &TaskId, patch: TaskPatch) -> StoreResult<Task> {
        let mut inner = self.inner.lock();
        let task = inner.tasks.get_mut(id.as_str()).ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
        if task.status.is_closed() && !matches!(patch.status, Some(TaskStatus::Closed) | None) {
            return Err(StoreError::Invalid(format!("task {id} is closed and cannot be reopened")));
        }
        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(priority) = patch.priority {
            task.priority = Some(priority);
        }
        if let Some(assignee) = patch.assignee {
            task.assignee = Some(assignee);
        }
        if let Some(labels) = patch.labels {
            task.labels = labels;
        }
        if let Some(deps) = patch.depends_on_ids {
            task.depends_on_ids = deps.into_iter().map(TaskId::new).collect();
        }
        task.updated_at = chrono::Utc::now().to_rfc3339();
        Ok(task.clone())
    }

    async fn close(&self, id: &TaskId, reason: Option<&str>) -> StoreResult<Task> {
        let mut inner = self.inner.lock();
        let now = chrono::Utc::now().to_rfc3339();
        let task = inner.tasks.get_mut(id.as_str()).ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
        task.status = TaskStatus::Closed;
        task.updated_at = now.clone();
        if let Some(reason) = reason {
            task.comments.push(Comment { author: "system".into(), text: format!("Closed: {reason}"), created_at: now });
        }
        Ok(task.clone())
    }

    async fn search(&self, query: &str, opts: &SearchOpts) -> StoreResult<Vec<CompactTaskView>> {
        let needle = query.to_lowercase();
        let inner = self.inner.lock();
        let mut matches: Vec<CompactTaskView> = inner
            .tasks
            .values()
            .filter(|t| t.title.to_lowercase().contains(&needle) || t.description.to_lowercase().contains(&needle))
            .map(CompactTaskView::from_task)
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(match opts.limit {
            Some(n) => matches.into_iter().take(n).collect(),
            None => matches,
        })
    }

    async fn query(&self, expr: &str, args: &[String]) -> StoreResult<Vec<CompactTaskView>> {
        if let Some(label) = expr.strip_prefix("label:") {
            let label = args.first().map(String::as_str).unwrap_or(label);
            let inner = self.inner.lock();
            return Ok(inner.tasks.values().filter(|t| t.has_label(label)).map(CompactTaskView::from_task).collect());
        }
        Err(StoreError::Invalid(format!("unsupported query expression: {expr}")))
    }

    async fn claim(&self, id: &TaskId) -> StoreResult<bool> {
        let mut inner = self.inner.lock();
        let task = inner.tasks.get_mut(id.as_str()).ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
        if task.assignee.is_some() {
            return Ok(false);
        }
        task.assignee = Some("claimed".to_string());
        task.status = TaskStatus::InProgress;
        task.updated_at = chrono::Utc::now().to_rfc3339();
        Ok(true)
    }

    async fn update_status(&self, id: &TaskId, status: TaskStatus) -> StoreResult<Task> {
        self.update(id, TaskPatch { status: Some(status), ..Default::default() }).await
    }

    async fn add_label(&self, id: &TaskId, label: &str) -> StoreResult<Task> {
        let mut inner = self.inner.lock();
        let task = inner.tasks.get_mut(id.as_str()).ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
        if !task.has_label(label) {
            task.labels.push(label.to_string());
        }
        task.updated_at = chrono::Utc::now().to_rfc3339();
        Ok(task.clone())
    }

    async fn comment(&self, id: &TaskId, text: &str, actor: Option<&str>) -> StoreResult<Task> {
        let mut inner = self.inner.lock();
        let now = chrono::Utc::now().to_rfc3339();
        let task = inner.tasks.get_mut(id.as_str()).ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
        task.comments.push(Comment { author: actor.unwrap_or("system").to_string(), text: text.to_string(), created_at: now.clone() });
        task.updated_at = now;
        Ok(task.clone())
    }

    async fn comments(&self, id: &TaskId) -> StoreResult<Vec<Comment>> {
        Ok(self.inner.lock().tasks.get(id.as_str()).ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?.comments.clone())
    }

    async fn dep_tree(&self, id: &TaskId, opts: &DepTreeOpts) -> StoreResult<DepTreeNode> {
        let inner = self.inner.lock();
        fn walk(tasks: &HashMap<String, Task>, id: &TaskId, depth: usize, max_depth: Option<usize>) -> StoreResult<DepTreeNode> {
            let task = tasks.get(id.as_str()).ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
            let children = if max_depth.map(|max| depth >= max).unwrap_or(false) {
                Vec::new()
            } else {
                task.depends_on_ids.iter().map(|dep| walk(tasks, dep, depth + 1, max_depth)).collect::<StoreResult<Vec<_>>>()?
            };
            Ok(DepTreeNode { id: task.id.as_str().to_string(), status: task.status, children })
        }
        walk(&inner.tasks, id, 0, opts.max_depth)
    }

    async fn dep_add(&self, id: &TaskId, depends_on: &TaskId) -> StoreResult<Task> {
        let mut inner = self.inner.lock();
        if !inner.tasks.contains_key(depends_on.as_str()) {
            return Err(StoreError::NotFound(depends_on.as_str().to_string()));
        }
        let task = inner.tasks.get_mut(id.as_str()).ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
        task.depends_on_ids.insert(depends_on.clone());
        task.updated_at = chrono::Utc::now().to_rfc3339();
        Ok(task.clone())
    }

    async fn types(&self) -> StoreResult<Vec<String>> {
        Ok(vec![IssueType::Task.to_string(), IssueType::Agent.to_string()])
    }

    async fn delete(&self, id: &TaskId) -> StoreResult<()> {
        if self.inner.lock().tasks.remove(id.as_str()).is_none() {
            return Err(StoreError::NotFound(id.as_str().to_string()));
        }
        Ok(())
    }

    async fn activity(&self, opts: &ActivityOpts) -> StoreResult<Vec<ActivityEntry>> {
        let inner = self.inner.lock();
        let mut entries: Vec<ActivityEntry> =
            inner.activity.iter().filter(|e| opts.since.as_ref().map(|s| e.at.as_str() >= s.as_str()).unwrap_or(true)).cloned().collect();
        entries.sort_by(|a, b| b.at.cmp(&a.at));
        Ok(match opts.limit {
            Some(n) => entries.into_iter().take(n).collect(),
            None => entries,
        })
    }

    async fn create_agent(&self, name: &str) -> StoreResult<StoredAgent> {
        let mut inner = self.inner.lock();
        let id = format!("agent-{}", inner.agents.len());
        let record = StoredAgent {
            id: id.clone(),
            name: name.to_string(),
            state: "running".to_string(),
            task_id: None,
            hook_task: None,
            usage_snapshot: serde_json::json!({}),
            last_heartbeat: None,
        };
        inner.agents.insert(id, record.clone());
        Ok(record)
    }

    async fn set_agent_state(&self, id: &str, state: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let agent = inner.agents.get_mut(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        agent.state = state.to_string();
        Ok(())
    }

    async fn heartbeat(&self, id: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let agent = inner.agents.get_mut(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        agent.last_heartbeat = Some(chrono::Utc::now().to_rfc3339());
        Ok(())
    }

    async fn set_slot(&self, task_id: &TaskId, agent_id: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if !inner.tasks.contains_key(task_id.as_str()) {
            return Err(StoreError::NotFound(task_id.as_str().to_string()));
        }
        let agent = inner.agents.get_mut(agent_id).ok_or_else(|| StoreError::NotFound(agent_id.to_string()))?;
        agent.hook_task = Some(task_id.as_str().to_string());
        agent.task_id = Some(task_id.clone());
        Ok(())
    }

    async fn clear_slot(&self, task_id: &TaskId) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        for agent in inner.agents.values_mut() {
            if agent.task_id.as_ref() == Some(task_id) {
                agent.hook_task = None;
                agent.task_id = None;
            }
        }
        Ok(())
    }

    async fn list_agents_for_task(&self, task_id: &TaskId) -> StoreResult<Vec<StoredAgent>> {
        Ok(self.inner.lock().agents.values().filter(|a| a.task_id.as_ref() == Some(task_id)).cloned().collect())
    }

    fn subscribe(&self, _listener: crate::store::StoreListener) -> Subscription {
        Subscription::new(|| {})
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
