//! Workflow Engine — spec §4.F.
//!
//! Two implementations share the same dispatch contract: [`Autonomous`]
//! applies every side effect the instant dispatch produces it, while
//! [`Interactive`] queues effects per task for later `approve`/`reject`.
//! Neither knows how to actually spawn a role or mutate the store — that's
//! the daemon's job; this module only decides what happens to the effects
//! a dispatch already produced.

mod mode;

pub use mode::{resolve_auto_process_ready_tasks, AutoProcessSource};

use std::collections::HashMap;

use fleet_core::{SideEffect, TaskId};
use parking_lot::Mutex;

/// Result of a role dispatch (spec §4.F `dispatch(role, task) -> {success, ...}`).
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub success: bool,
    pub effects: Vec<SideEffect>,
}

impl DispatchOutcome {
    pub fn new(success: bool, effects: Vec<SideEffect>) -> Self {
        Self { success, effects }
    }
}

/// Shared dispatch contract the Agent Loop drives against.
pub trait WorkflowEngine: Send + Sync {
    /// Hand a dispatch's effects to the workflow; returns the effects that
    /// are ready to apply right now (empty for interactive mode, which
    /// holds them until `approve_side_effects`).
    fn submit(&self, outcome: DispatchOutcome) -> Vec<SideEffect>;

    /// `getPendingSideEffects(taskId)`. Always empty for a workflow that
    /// never queues (e.g. [`AutonomousWorkflow`]).
    fn pending(&self, _task_id: &TaskId) -> Vec<SideEffect> {
        Vec::new()
    }

    /// `approveSideEffects(taskId)`: drain and return the queued effects in
    /// apply order. Always empty for a workflow that never queues.
    fn approve_side_effects(&self, _task_id: &TaskId) -> Vec<SideEffect> {
        Vec::new()
    }

    /// `rejectSideEffects(taskId)`: drop any queued effects without applying.
    fn reject_side_effects(&self, _task_id: &TaskId) {}
}

/// Apply every side effect immediately (spec §4.F "Autonomous", the default).
#[derive(Debug, Default)]
pub struct AutonomousWorkflow;

impl WorkflowEngine for AutonomousWorkflow {
    fn submit(&self, outcome: DispatchOutcome) -> Vec<SideEffect> {
        outcome.effects
    }
}

/// Queue side effects per task until explicitly approved or rejected
/// (spec §4.F "Interactive"). Per-task queues are independent; operations
/// on an unknown task id are no-ops.
#[derive(Default)]
pub struct InteractiveWorkflow {
    queues: Mutex<HashMap<TaskId, Vec<SideEffect>>>,
}

impl InteractiveWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// `getPendingSideEffects(taskId)`.
    pub fn pending(&self, task_id: &TaskId) -> Vec<SideEffect> {
        self.queues.lock().get(task_id).cloned().unwrap_or_default()
    }

    /// `approveSideEffects(taskId)`: drain and return in apply order
    /// (comments, then status updates, then follow-up spawns — spec §8
    /// property 7). A no-op on an unknown task id.
    pub fn approve_side_effects(&self, task_id: &TaskId) -> Vec<SideEffect> {
        let mut effects = self.queues.lock().remove(task_id).unwrap_or_default();
        effects.sort_by_key(SideEffect::apply_order_rank);
        effects
    }

    /// `rejectSideEffects(taskId)`: drop without applying.
    pub fn reject_side_effects(&self, task_id: &TaskId) {
        self.queues.lock().remove(task_id);
    }
}

impl WorkflowEngine for InteractiveWorkflow {
    fn submit(&self, outcome: DispatchOutcome) -> Vec<SideEffect> {
        let mut queues = self.queues.lock();
        for effect in outcome.effects {
            queues.entry(effect.task_id().clone()).or_default().push(effect);
        }
        Vec::new()
    }

    fn pending(&self, task_id: &TaskId) -> Vec<SideEffect> {
        self.pending(task_id)
    }

    fn approve_side_effects(&self, task_id: &TaskId) -> Vec<SideEffect> {
        self.approve_side_effects(task_id)
    }

    fn reject_side_effects(&self, task_id: &TaskId) {
        self.reject_side_effects(task_id)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
