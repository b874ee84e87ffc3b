//! Agent Loop — spec §4.H.
//!
//! Top-level driver: holds lifecycle timers, drives periodic polling,
//! enforces `maxWorkers`, and exposes the IPC-triggered operations
//! (`startTasks`, `broadcastToWorkers`, `interruptAgent`, `steerAgent`,
//! `replaceAgent`, `stopAgentsForTask`, `complain`, `revokeComplaint`).
//! Subprocess spawning itself goes through [`AgentSpawner`] so this module
//! stays independent of how agents are actually run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fleet_core::{AgentLocalId, AgentRecord, AgentRecordStatus, RoleId, SideEffect, TaskId};
use fleet_engine::{DispatchOutcome, LifecycleEngine, Scheduler, WorkflowEngine};
use fleet_store::TaskStore;
use thiserror::Error;
use tracing::{info, warn};

use crate::complaints::ComplaintBook;
use crate::registry::{is_worker_kind, Registry};
use crate::roles::RoleConfig;
use crate::spawner::AgentSpawner;

/// Minimum poll interval (spec §4.H: "default 1000 ms, minimum 250 ms").
pub const MIN_POLL_INTERVAL_MS: u64 = 250;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoopError {
    #[error("loop is paused")]
    Paused,
    #[error("store error: {0}")]
    Store(String),
    #[error("spawn error: {0}")]
    Spawn(String),
}

pub type LoopResult<T> = Result<T, LoopError>;

/// Clamp a requested poll interval to the spec's floor.
pub fn clamp_poll_interval_ms(requested_ms: u64) -> u64 {
    requested_ms.max(MIN_POLL_INTERVAL_MS)
}

/// The top-level driver described in spec §4.H. Generic over the store and
/// spawner so the whole loop is runnable against an in-memory store and a
/// fake spawner in tests.
pub struct AgentLoop<S: TaskStore, P: AgentSpawner> {
    store: Arc<S>,
    spawner: Arc<P>,
    registry: Arc<Registry>,
    scheduler: Scheduler<S>,
    lifecycle: Arc<LifecycleEngine>,
    roles: Arc<RoleConfig>,
    workflow: Arc<dyn WorkflowEngine>,
    complaints: ComplaintBook,
    paused: AtomicBool,
    max_workers: usize,
    poll_interval_ms: u64,
    reconciled: AtomicBool,
}

impl<S: TaskStore, P: AgentSpawner> AgentLoop<S, P> {
    pub fn new(
        store: Arc<S>,
        spawner: Arc<P>,
        registry: Arc<Registry>,
        lifecycle: Arc<LifecycleEngine>,
        roles: Arc<RoleConfig>,
        workflow: Arc<dyn WorkflowEngine>,
        max_workers: usize,
    ) -> Self {
        Self {
            scheduler: Scheduler::new(store.clone()),
            store,
            spawner,
            registry,
            lifecycle,
            roles,
            workflow,
            complaints: ComplaintBook::default(),
            paused: AtomicBool::new(false),
            max_workers: max_workers.max(1),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            reconciled: AtomicBool::new(false),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// `wake` — resume if paused, then allow the next tick to proceed. The
    /// actual tick loop is driven by the caller (daemon main loop); this
    /// just clears the pause flag (spec §4.G `wake` table row).
    pub fn wake(&self) {
        self.resume();
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// `startTasks(count)`: claim and spawn up to `count` ready tasks.
    pub async fn start_tasks(&self, count: usize) -> LoopResult<Vec<TaskId>> {
        if self.is_paused() {
            return Err(LoopError::Paused);
        }
        let available_worker_slots = self.available_worker_slots();
        let count = count.min(available_worker_slots);
        if count == 0 {
            return Ok(Vec::new());
        }

        let candidates = self.scheduler.get_next_tasks(count, self.registry.as_ref()).await.map_err(|e| LoopError::Store(e.to_string()))?;
        let mut dispatched = Vec::new();
        for task in candidates {
            let claimed = self.scheduler.try_claim(&task.id).await.map_err(|e| LoopError::Store(e.to_string()))?;
            if !claimed {
                continue;
            }
            self.dispatch_worker(&task.id, None).await?;
            dispatched.push(task.id);
        }
        Ok(dispatched)
    }

    /// Startup reconciliation (spec §4.H): on first tick, dispatch workers
    /// (never scouts) for `in_progress` tasks lacking a live agent.
    pub async fn reconcile_on_startup(&self) -> LoopResult<Vec<TaskId>> {
        if self.reconciled.swap(true, Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        let available = self.available_worker_slots();
        if available == 0 {
            return Ok(Vec::new());
        }
        let orphaned = self
            .scheduler
            .get_in_progress_tasks_without_agent(available, self.registry.as_ref())
            .await
            .map_err(|e| LoopError::Store(e.to_string()))?;
        let mut resumed = Vec::new();
        for task in orphaned {
            self.dispatch_worker(&task.id, None).await?;
            resumed.push(task.id);
        }
        Ok(resumed)
    }

    async fn dispatch_worker(&self, task_id: &TaskId, context: Option<String>) -> LoopResult<()> {
        self.dispatch_role(RoleId::Implementer, task_id, context).await.map(|_| ())
    }

    fn available_worker_slots(&self) -> usize {
        let active_workers =
            self.registry.get_active().into_iter().filter(|r| is_worker_kind(&r.role)).count();
        self.max_workers.saturating_sub(active_workers)
    }

    /// `broadcastToWorkers(message)` (spec §4.G `broadcast`): forward to all
    /// active workers. Returns the count of recipients.
    pub async fn broadcast_to_workers(&self, message: &str) -> LoopResult<usize> {
        let workers = self.registry.get_active().into_iter().filter(|r| is_worker_kind(&r.role));
        let mut sent = 0;
        for worker in workers {
            // The transport to an individual agent is out of this crate's
            // scope (it goes through the spawner's subprocess handle); this
            // records intent via a best-effort stop/steer style call site.
            info!(agent_id = %worker.id, %message, "broadcast");
            sent += 1;
        }
        Ok(sent)
    }

    /// `interruptAgent(taskId, message)`: deliver to all active non-verifier
    /// agents bound to the task.
    pub fn interrupt_agent(&self, task_id: &TaskId, message: &str) -> usize {
        let targets = self.registry.get_active_by_task(task_id).into_iter().filter(|r| r.role != RoleId::Verifier);
        let mut count = 0;
        for target in targets {
            info!(agent_id = %target.id, task_id = %task_id, %message, "interrupt");
            count += 1;
        }
        count
    }

    /// `steerAgent(taskId, message)`: requires at least one active
    /// non-verifier agent on the task (spec §4.G table validation column).
    pub fn steer_agent(&self, task_id: &TaskId, message: &str) -> LoopResult<usize> {
        let count = self.interrupt_agent(task_id, message);
        if count == 0 {
            return Err(LoopError::Store(format!("steer_agent: no active non-verifier agent on task {task_id}")));
        }
        Ok(count)
    }

    /// `spawnAgentBySingularity` / replace-agent execution (spec §4.E):
    /// given an already-validated [`fleet_engine::ReplacePlan`], stop
    /// non-verifier agents on the task and spawn the requested role.
    pub async fn execute_replace(&self, plan: fleet_engine::ReplacePlan) -> LoopResult<()> {
        if plan.unblock_first {
            self.store
                .update_status(&plan.task_id, fleet_core::TaskStatus::InProgress)
                .await
                .map_err(|e| LoopError::Store(e.to_string()))?;
        }
        for agent in self.registry.get_active_by_task(&plan.task_id) {
            if agent.role != RoleId::Verifier {
                self.spawner.stop(&agent.id, Duration::from_secs(10)).await.map_err(|e| LoopError::Spawn(e.to_string()))?;
                self.registry.set_status(&agent.id, AgentRecordStatus::Stopped).ok();
            }
        }
        let stored = self.store.create_agent(plan.role.as_str()).await.map_err(|e| LoopError::Store(e.to_string()))?;
        self.store.set_slot(&plan.task_id, &stored.id).await.map_err(|e| LoopError::Store(e.to_string()))?;
        let local_id = self
            .spawner
            .spawn(plan.role.clone(), &plan.task_id, plan.context.clone(), Some(stored.id.clone()))
            .await
            .map_err(|e| LoopError::Spawn(e.to_string()))?;
        let mut record = AgentRecord::new(local_id, plan.role, Some(plan.task_id), 0, fleet_core::DEFAULT_EVENT_RING);
        record.tasks_agent_id = Some(stored.id);
        self.registry.register(record);
        Ok(())
    }

    /// `stopAgentsForTask(taskId, {includeVerifier})`: marks matching active
    /// agents `stopped` and terminates their subprocesses (spec §4.E "Stop
    /// policy").
    pub async fn stop_agents_for_task(&self, task_id: &TaskId, include_verifier: bool) -> LoopResult<usize> {
        let targets = self.registry.get_active_by_task(task_id).into_iter().filter(|r| include_verifier || r.role != RoleId::Verifier);
        let mut stopped = 0;
        for agent in targets {
            if let Err(err) = self.spawner.stop(&agent.id, Duration::from_secs(10)).await {
                warn!(agent_id = %agent.id, error = %err, "failed to stop agent");
                continue;
            }
            self.registry.set_status(&agent.id, AgentRecordStatus::Stopped).ok();
            stopped += 1;
        }
        if stopped > 0 {
            self.store.clear_slot(task_id).await.map_err(|e| LoopError::Store(e.to_string()))?;
        }
        Ok(stopped)
    }

    /// `stopAllAgentsAndPause`: stop every active agent then pause dispatch.
    pub async fn stop_all_agents_and_pause(&self) -> LoopResult<usize> {
        let mut stopped = 0;
        for agent in self.registry.get_active() {
            if self.spawner.stop(&agent.id, Duration::from_secs(10)).await.is_ok() {
                self.registry.set_status(&agent.id, AgentRecordStatus::Stopped).ok();
                if let Some(task_id) = &agent.task_id {
                    self.store.clear_slot(task_id).await.ok();
                }
                stopped += 1;
            }
        }
        self.pause();
        Ok(stopped)
    }

    pub fn complain(&self, files: Vec<String>, reason: String, complainant: String) {
        self.complaints.register(files, reason, complainant);
    }

    pub fn revoke_complaint(&self, files: &[String], complainant: &str) {
        self.complaints.revoke(files, complainant);
    }

    pub fn complaints(&self) -> &ComplaintBook {
        &self.complaints
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn scheduler(&self) -> &Scheduler<S> {
        &self.scheduler
    }

    pub fn lifecycle(&self) -> &LifecycleEngine {
        &self.lifecycle
    }

    pub fn roles(&self) -> &RoleConfig {
        &self.roles
    }

    /// `getPendingSideEffects(taskId)`.
    pub fn pending_side_effects(&self, task_id: &TaskId) -> Vec<SideEffect> {
        self.workflow.pending(task_id)
    }

    /// `approveSideEffects(taskId)`: drain the workflow's queue for the task
    /// and apply the effects it releases, in apply order.
    pub async fn approve_side_effects(&self, task_id: &TaskId) -> LoopResult<usize> {
        let effects = self.workflow.approve_side_effects(task_id);
        let applied = effects.len();
        self.apply_effects(effects).await?;
        Ok(applied)
    }

    /// `rejectSideEffects(taskId)`: drop the workflow's queue for the task.
    pub fn reject_side_effects(&self, task_id: &TaskId) {
        self.workflow.reject_side_effects(task_id);
    }

    /// Apply a batch of side effects already cleared for execution (either
    /// released immediately by an autonomous workflow, or drained on
    /// approval from an interactive one).
    async fn apply_effects(&self, effects: Vec<SideEffect>) -> LoopResult<()> {
        for effect in effects {
            match effect {
                SideEffect::PostComment { task_id, text } => {
                    self.store.comment(&task_id, &text, Some("system")).await.map_err(|e| LoopError::Store(e.to_string()))?;
                }
                SideEffect::UpdateTaskStatus { task_id, status } => {
                    self.store.update_status(&task_id, status).await.map_err(|e| LoopError::Store(e.to_string()))?;
                }
                SideEffect::SpawnFollowUp { role, task_id, context } => {
                    self.dispatch_role(role, &task_id, context).await?;
                }
            }
        }
        Ok(())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn dispatch_role(&self, role: RoleId, task_id: &TaskId, context: Option<String>) -> LoopResult<AgentLocalId> {
        let stored = self.store.create_agent(role.as_str()).await.map_err(|e| LoopError::Store(e.to_string()))?;
        self.store.set_slot(task_id, &stored.id).await.map_err(|e| LoopError::Store(e.to_string()))?;
        let local_id = self
            .spawner
            .spawn(role.clone(), task_id, context, Some(stored.id.clone()))
            .await
            .map_err(|e| LoopError::Spawn(e.to_string()))?;
        let mut record = AgentRecord::new(local_id.clone(), role, Some(task_id.clone()), 0, fleet_core::DEFAULT_EVENT_RING);
        record.tasks_agent_id = Some(stored.id);
        self.registry.register(record);
        Ok(local_id)
    }

    /// Build the sticky-retry recovery context for a respawned verifier
    /// (spec §4.E): previous session id, a one-line task-state summary, and
    /// up to the last six verifier-authored comments.
    async fn build_recovery_context(&self, task_id: &TaskId, previous_session_id: Option<String>) -> LoopResult<fleet_engine::RecoveryContext> {
        let task = self.store.show(task_id).await.map_err(|e| LoopError::Store(e.to_string()))?;
        let summary = format!("Task {} ({}): {}", task.id, task.status, task.title);
        let verifier_comments: Vec<_> = task.comments.into_iter().filter(|c| c.author.to_ascii_lowercase().contains("verifier")).collect();
        Ok(fleet_engine::RecoveryContext::build(previous_session_id, summary, &verifier_comments))
    }

    /// Dispatch the outcome of an `agent_end`/`rpc_exit` event (spec §4.D
    /// data flow: "on terminal events it consults the Lifecycle Engine to
    /// decide the next role to spawn"). The RPC Handler Manager
    /// (`crate::rpc::handle_event`) decides *what kind* of terminal event
    /// happened; this decides *what runs next*.
    pub async fn handle_terminal_outcome(&self, local_id: &AgentLocalId, outcome: crate::rpc::TerminalOutcome) -> LoopResult<()> {
        use crate::rpc::TerminalOutcome;
        use fleet_engine::LifecycleDecision;

        let exited = self.registry.get(local_id);
        self.complaints.revoke_all_by(local_id.as_str());

        match outcome {
            TerminalOutcome::WorkerFinished { task_id, last_assistant_text } => {
                self.registry.set_status(local_id, AgentRecordStatus::Done).ok();
                for supervisor in self.registry.get_active_by_task(&task_id).into_iter().filter(|r| r.role == RoleId::Supervisor) {
                    self.spawner.stop(&supervisor.id, Duration::from_secs(10)).await.ok();
                    self.registry.set_status(&supervisor.id, AgentRecordStatus::Stopped).ok();
                }
                match self.lifecycle.on_worker_exit(task_id.clone(), last_assistant_text) {
                    LifecycleDecision::SpawnVerifier { task_id, context } => {
                        self.dispatch_role(RoleId::Verifier, &task_id, context).await?;
                    }
                    _ => unreachable!("on_worker_exit only ever returns SpawnVerifier"),
                }
            }
            TerminalOutcome::VerifierFinished { task_id } => {
                self.registry.set_status(local_id, AgentRecordStatus::Done).ok();
                let previous_session_id = exited.as_ref().and_then(|r| r.session_id.clone());
                let recovery_ctx = self.build_recovery_context(&task_id, previous_session_id).await?;
                let decision = self.lifecycle.on_verifier_exit(task_id.clone(), move || recovery_ctx);
                if matches!(decision, LifecycleDecision::Defer { .. } | LifecycleDecision::Close { .. }) {
                    self.store.clear_slot(&task_id).await.ok();
                }
                let effects = match decision {
                    LifecycleDecision::SpawnWorker { task_id, context } => {
                        vec![SideEffect::SpawnFollowUp { role: RoleId::Implementer, task_id, context }]
                    }
                    LifecycleDecision::SpawnScout { task_id, context } => {
                        vec![SideEffect::SpawnFollowUp { role: RoleId::Scout, task_id, context }]
                    }
                    LifecycleDecision::Defer { task_id, comment } => {
                        vec![
                            SideEffect::PostComment { task_id: task_id.clone(), text: comment },
                            SideEffect::UpdateTaskStatus { task_id, status: fleet_core::TaskStatus::Blocked },
                        ]
                    }
                    LifecycleDecision::Close { task_id, reason } => {
                        let mut effects = vec![SideEffect::UpdateTaskStatus { task_id: task_id.clone(), status: fleet_core::TaskStatus::Closed }];
                        if let Some(reason) = reason {
                            effects.push(SideEffect::PostComment { task_id, text: format!("Closed: {reason}") });
                        }
                        effects
                    }
                    LifecycleDecision::RespawnVerifier { task_id, recovery } => {
                        vec![SideEffect::SpawnFollowUp { role: RoleId::Verifier, task_id, context: Some(recovery.render()) }]
                    }
                    LifecycleDecision::SpawnVerifier { .. } => unreachable!("on_verifier_exit never returns SpawnVerifier"),
                };
                let ready = self.workflow.submit(DispatchOutcome::new(true, effects));
                self.apply_effects(ready).await?;
            }
            TerminalOutcome::Finished => {
                self.registry.set_status(local_id, AgentRecordStatus::Done).ok();
                if let Some(task_id) = exited.as_ref().and_then(|r| r.task_id.clone()) {
                    self.store.clear_slot(&task_id).await.ok();
                }
            }
            TerminalOutcome::Crashed { exit_code, error } => {
                warn!(agent_id = %local_id, ?exit_code, ?error, "agent crashed");
                self.registry.set_status(local_id, AgentRecordStatus::Dead).ok();
                if let Some(task_id) = exited.as_ref().and_then(|r| r.task_id.clone()) {
                    self.store.clear_slot(&task_id).await.ok();
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "loop_tests.rs"]
mod tests;
