//! File-backed reference [`TaskStore`] implementation: a single JSON
//! document guarded by an advisory `fs2` lock (spec §6 "file-backed vs.
//! CLI-backed"), kept as a flat document since this system has no
//! WAL/event-sourcing requirement of its own.

use async_trait::async_trait;
use fleet_core::{Comment, IssueType, Task, TaskId, TaskStatus};
use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use crate::error::StoreError;
use crate::store::{StoreEvent, StoreResult, Subscription, TaskStore};
use crate::types::{
    ActivityEntry, ActivityOpts, CompactTaskView, CreateTaskInput, DepTreeNode, DepTreeOpts, ListOpts, SearchOpts, StoredAgent, TaskPatch,
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    tasks: HashMap<String, Task>,
    agents: HashMap<String, StoredAgent>,
    activity: Vec<ActivityEntry>,
    #[serde(default)]
    next_task_seq: u64,
}

/// A file-backed task store. One JSON document per path, rewritten
/// whole-file on every mutation under an exclusive `flock`.
pub struct FileTaskStore {
    path: PathBuf,
    listeners: Mutex<Vec<(u64, crate::store::StoreListener)>>,
    next_listener_id: Mutex<u64>,
}

impl FileTaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), listeners: Mutex::new(Vec::new()), next_listener_id: Mutex::new(0) }
    }

    fn open_locked(&self) -> StoreResult<File> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().read(true).write(true).create(true).open(&self.path)?;
        file.lock_exclusive()?;
        Ok(file)
    }

    fn read_document(file: &mut File) -> StoreResult<Document> {
        file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        if contents.trim().is_empty() {
            return Ok(Document::default());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_document(file: &mut File, doc: &Document) -> StoreResult<()> {
        let serialized = serde_json::to_string_pretty(doc)?;
        file.seek(SeekFrom::Start(0))?;
        file.set_len(0)?;
        file.write_all(serialized.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Run `f` with an exclusive lock held over the read-modify-write cycle,
    /// then notify subscribers. `f` returns the value to hand back to the
    /// caller plus the set of task ids that changed.
    fn with_doc<T>(&self, f: impl FnOnce(&mut Document) -> StoreResult<(T, Vec<TaskId>)>) -> StoreResult<T> {
        let mut file = self.open_locked()?;
        let mut doc = Self::read_document(&mut file)?;
        let (value, changed) = f(&mut doc)?;
        Self::write_document(&mut file, &doc)?;
        file.unlock()?;
        for id in changed {
            self.notify(StoreEvent::TaskChanged(id));
        }
        Ok(value)
    }

    fn read_doc<T>(&self, f: impl FnOnce(&Document) -> StoreResult<T>) -> StoreResult<T> {
        let mut file = self.open_locked()?;
        let doc = Self::read_document(&mut file)?;
        let result = f(&doc);
        file.unlock()?;
        result
    }

    fn notify(&self, event: StoreEvent) {
        for (_, listener) in self.listeners.lock().iter() {
            listener(&event);
        }
    }

    fn require_task<'a>(doc: &'a Document, id: &TaskId) -> StoreResult<&'a Task> {
        doc.tasks.get(id.as_str()).ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))
    }
}

fn dependencies_closed(doc: &Document, task: &Task) -> bool {
    task.depends_on_ids.iter().all(|dep| doc.tasks.get(dep.as_str()).map(|t| t.status.is_closed()).unwrap_or(false))
}

#[async_trait]
impl TaskStore for FileTaskStore {
    async fn ready(&self) -> StoreResult<Vec<Task>> {
        self.read_doc(|doc| {
            Ok(doc
                .tasks
                .values()
                .filter(|t| matches!(t.status, TaskStatus::Open | TaskStatus::InProgress) && t.assignee.is_none())
                .filter(|t| dependencies_closed(doc, t))
                .cloned()
                .collect())
        })
    }

    async fn list(&self, opts: &ListOpts) -> StoreResult<Vec<CompactTaskView>> {
        self.read_doc(|doc| {
            let default_type_task = !opts.include_closed && opts.issue_type.is_none();
            let mut items: Vec<&Task> = doc
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
        })
    }

    async fn show(&self, id: &TaskId) -> StoreResult<Task> {
        self.read_doc(|doc| Self::require_task(doc, id).cloned())
    }

    async fn create(&self, input: CreateTaskInput) -> StoreResult<Task> {
        self.with_doc(|doc| {
            let seq = doc.next_task_seq;
            doc.next_task_seq += 1;
            let id = TaskId::new(format!("task-{seq}"));
            let now = chrono::Utc::now().to_rfc3339();
            let task = Task {
                id: id.clone(),
                title: input.title,
                description: input.description.unwrap_or_default(),
                status: TaskStatus::Open,
                priority: input.priority,
                issue_type: input.issue_type.as_deref().map(parse_issue_type).unwrap_or(IssueType::Task),
                labels: input.labels,
                assignee: None,
                depends_on_ids: input.depends_on_ids.into_iter().map(TaskId::new).collect(),
                references: Default::default(),
                comments: Vec::new(),
                created_at: now.clone(),
                updated_at: now,
            };
            doc.tasks.insert(id.as_str().to_string(), task.clone());
            Ok((task, vec![id]))
        })
    }

    async fn update(&self, id: &TaskId, patch: TaskPatch) -> StoreResult<Task> {
        self.with_doc(|doc| {
            let task = doc.tasks.get_mut(id.as_str()).ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
            if task.status.is_closed() {
                return Err(StoreError::Invalid(format!("task {id} is closed and cannot be reopened")));
            }
            if let Some(title) = patch.title {
                task.title = title;
            }
            if let Some(description) = patch.description {
                task.description = description;
            }
            if let Some(status) = patch.status {
                if task.status.is_closed() && status != TaskStatus::Closed {
                    return Err(StoreError::Invalid(format!("task {id} is closed and cannot be reopened")));
                }
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
            Ok((task.clone(), vec![id.clone()]))
        })
    }

    async fn close(&self, id: &TaskId, reason: Option<&str>) -> StoreResult<Task> {
        self.with_doc(|doc| {
            let task = doc.tasks.get_mut(id.as_str()).ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
            task.status = TaskStatus::Closed;
            task.updated_at = chrono::Utc::now().to_rfc3339();
            if let Some(reason) = reason {
                task.comments.push(Comment { author: "system".into(), text: format!("Closed: {reason}"), created_at: task.updated_at.clone() });
            }
            Ok((task.clone(), vec![id.clone()]))
        })
    }

    async fn search(&self, query: &str, opts: &SearchOpts) -> StoreResult<Vec<CompactTaskView>> {
        let needle = query.to_lowercase();
        self.read_doc(|doc| {
            let mut matches: Vec<CompactTaskView> = doc
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
        })
    }

    async fn query(&self, expr: &str, args: &[String]) -> StoreResult<Vec<CompactTaskView>> {
        // The query DSL itself is an external-collaborator concern; this
        // reference store only supports the trivial `label:<value>` form
        // used by the daemon's own tests.
        if let Some(label) = expr.strip_prefix("label:") {
            let label = args.first().map(String::as_str).unwrap_or(label);
            return self.read_doc(|doc| Ok(doc.tasks.values().filter(|t| t.has_label(label)).map(CompactTaskView::from_task).collect()));
        }
        Err(StoreError::Invalid(format!("unsupported query expression: {expr}")))
    }

    async fn claim(&self, id: &TaskId) -> StoreResult<bool> {
        self.with_doc(|doc| {
            let task = doc.tasks.get_mut(id.as_str()).ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
            if task.assignee.is_some() {
                return Err(StoreError::AlreadyClaimed(id.as_str().to_string()));
            }
            task.assignee = Some("claimed".to_string());
            task.status = TaskStatus::InProgress;
            task.updated_at = chrono::Utc::now().to_rfc3339();
            Ok((true, vec![id.clone()]))
        })
        .or_else(|e| if matches!(e, StoreError::AlreadyClaimed(_)) { Ok(false) } else { Err(e) })
    }

    async fn update_status(&self, id: &TaskId, status: TaskStatus) -> StoreResult<Task> {
        self.update(id, TaskPatch { status: Some(status), ..Default::default() }).await
    }

    async fn add_label(&self, id: &TaskId, label: &str) -> StoreResult<Task> {
        self.with_doc(|doc| {
            let task = doc.tasks.get_mut(id.as_str()).ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
            if !task.has_label(label) {
                task.labels.push(label.to_string());
            }
            task.updated_at = chrono::Utc::now().to_rfc3339();
            Ok((task.clone(), vec![id.clone()]))
        })
    }

    async fn comment(&self, id: &TaskId, text: &str, actor: Option<&str>) -> StoreResult<Task> {
        self.with_doc(|doc| {
            let task = doc.tasks.get_mut(id.as_str()).ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
            let now = chrono::Utc::now().to_rfc3339();
            task.comments.push(Comment { author: actor.unwrap_or("system").to_string(), text: text.to_string(), created_at: now.clone() });
            task.updated_at = now;
            Ok((task.clone(), vec![id.clone()]))
        })
    }

    async fn comments(&self, id: &TaskId) -> StoreResult<Vec<Comment>> {
        self.read_doc(|doc| Ok(Self::require_task(doc, id)?.comments.clone()))
    }

    async fn dep_tree(&self, id: &TaskId, opts: &DepTreeOpts) -> StoreResult<DepTreeNode> {
        self.read_doc(|doc| build_dep_tree(doc, id, opts.max_depth))
    }

    async fn dep_add(&self, id: &TaskId, depends_on: &TaskId) -> StoreResult<Task> {
        self.with_doc(|doc| {
            if !doc.tasks.contains_key(depends_on.as_str()) {
                return Err(StoreError::NotFound(depends_on.as_str().to_string()));
            }
            let task = doc.tasks.get_mut(id.as_str()).ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
            task.depends_on_ids.insert(depends_on.clone());
            task.updated_at = chrono::Utc::now().to_rfc3339();
            Ok((task.clone(), vec![id.clone()]))
        })
    }

    async fn types(&self) -> StoreResult<Vec<String>> {
        Ok(vec![IssueType::Task.to_string(), IssueType::Agent.to_string()])
    }

    async fn delete(&self, id: &TaskId) -> StoreResult<()> {
        self.with_doc(|doc| {
            if doc.tasks.remove(id.as_str()).is_none() {
                return Err(StoreError::NotFound(id.as_str().to_string()));
            }
            Ok(((), vec![id.clone()]))
        })
    }

    async fn activity(&self, opts: &ActivityOpts) -> StoreResult<Vec<ActivityEntry>> {
        self.read_doc(|doc| {
            let mut entries: Vec<ActivityEntry> = doc
                .activity
                .iter()
                .filter(|e| opts.since.as_ref().map(|s| e.at.as_str() >= s.as_str()).unwrap_or(true))
                .cloned()
                .collect();
            entries.sort_by(|a, b| b.at.cmp(&a.at));
            Ok(match opts.limit {
                Some(n) => entries.into_iter().take(n).collect(),
                None => entries,
            })
        })
    }

    async fn create_agent(&self, name: &str) -> StoreResult<StoredAgent> {
        self.with_doc(|doc| {
            let id = format!("agent-{}", doc.agents.len());
            let record = StoredAgent {
                id: id.clone(),
                name: name.to_string(),
                state: "running".to_string(),
                task_id: None,
                hook_task: None,
                usage_snapshot: serde_json::json!({}),
                last_heartbeat: None,
            };
            doc.agents.insert(id, record.clone());
            Ok((record, vec![]))
        })
    }

    async fn set_agent_state(&self, id: &str, state: &str) -> StoreResult<()> {
        self.with_doc(|doc| {
            let agent = doc.agents.get_mut(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            agent.state = state.to_string();
            Ok(((), vec![]))
        })
    }

    async fn heartbeat(&self, id: &str) -> StoreResult<()> {
        self.with_doc(|doc| {
            let agent = doc.agents.get_mut(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            agent.last_heartbeat = Some(chrono::Utc::now().to_rfc3339());
            Ok(((), vec![]))
        })
    }

    async fn set_slot(&self, task_id: &TaskId, agent_id: &str) -> StoreResult<()> {
        self.with_doc(|doc| {
            if !doc.tasks.contains_key(task_id.as_str()) {
                return Err(StoreError::NotFound(task_id.as_str().to_string()));
            }
            let agent = doc.agents.get_mut(agent_id).ok_or_else(|| StoreError::NotFound(agent_id.to_string()))?;
            agent.hook_task = Some(task_id.as_str().to_string());
            agent.task_id = Some(task_id.clone());
            Ok(((), vec![]))
        })
    }

    async fn clear_slot(&self, task_id: &TaskId) -> StoreResult<()> {
        self.with_doc(|doc| {
            for agent in doc.agents.values_mut() {
                if agent.task_id.as_ref() == Some(task_id) {
                    agent.hook_task = None;
                    agent.task_id = None;
                }
            }
            Ok(((), vec![]))
        })
    }

    async fn list_agents_for_task(&self, task_id: &TaskId) -> StoreResult<Vec<StoredAgent>> {
        self.read_doc(|doc| Ok(doc.agents.values().filter(|a| a.task_id.as_ref() == Some(task_id)).cloned().collect()))
    }

    fn subscribe(&self, listener: crate::store::StoreListener) -> Subscription {
        let mut next_id = self.next_listener_id.lock();
        let id = *next_id;
        *next_id += 1;
        drop(next_id);
        self.listeners.lock().push((id, listener));
        Subscription::new(move || {})
    }
}

fn parse_issue_type(s: &str) -> IssueType {
    if s == "agent" {
        IssueType::Agent
    } else {
        IssueType::Task
    }
}

fn build_dep_tree(doc: &Document, id: &TaskId, max_depth: Option<usize>) -> StoreResult<DepTreeNode> {
    fn walk(doc: &Document, id: &TaskId, depth: usize, max_depth: Option<usize>) -> StoreResult<DepTreeNode> {
        let task = doc.tasks.get(id.as_str()).ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
        let children = if max_depth.map(|max| depth >= max).unwrap_or(false) {
            Vec::new()
        } else {
            task.depends_on_ids.iter().map(|dep| walk(doc, dep, depth + 1, max_depth)).collect::<StoreResult<Vec<_>>>()?
        };
        Ok(DepTreeNode { id: task.id.as_str().to_string(), status: task.status, children })
    }
    walk(doc, id, 0, max_depth)
}

#[cfg(test)]
#[path = "file_store_tests.rs"]
mod tests;
