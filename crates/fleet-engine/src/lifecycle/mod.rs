//! Lifecycle Engine — spec §4.E.
//!
//! Owns the per-task [`fleet_core::LifecycleSlot`] map and turns a
//! worker/verifier exit into a [`LifecycleDecision`]. Deliberately has no
//! knowledge of subprocesses or the registry: the daemon's RPC Handler
//! Manager (`fleet-daemon::rpc`) executes the decisions this module
//! returns (spawn X, stop Y, persist Z).

mod recovery;
mod replace;

pub use recovery::RecoveryContext;
pub use replace::{is_replaceable, plan_replace, ReplaceError, ReplacePlan};

use std::collections::HashMap;

use fleet_core::{AdvanceAction, AdvanceSignal, CloseSignal, LifecycleSlot, TakenSignal, TaskId};
use parking_lot::Mutex;

/// What the lifecycle engine wants done next, for the daemon to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleDecision {
    /// Worker just exited: stop any in-flight supervisor, spawn a verifier.
    SpawnVerifier { task_id: TaskId, context: Option<String> },
    /// Verifier's `advance=worker` signal.
    SpawnWorker { task_id: TaskId, context: Option<String> },
    /// Verifier's `advance=scout` signal.
    SpawnScout { task_id: TaskId, context: Option<String> },
    /// Verifier's `advance=defer` signal: block the task with a comment.
    Defer { task_id: TaskId, comment: String },
    /// A `close` signal won (or the task was closed externally): no spawn.
    Close { task_id: TaskId, reason: Option<String> },
    /// Verifier exited with neither signal: sticky retry (spec §4.E, §8 property 5).
    RespawnVerifier { task_id: TaskId, recovery: RecoveryContext },
}

/// Per-task lifecycle state: the single-slot advance/close pair.
#[derive(Default)]
pub struct LifecycleEngine {
    slots: Mutex<HashMap<TaskId, LifecycleSlot>>,
}

impl LifecycleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a verifier `advance` signal (spec §4.G `advance_lifecycle`).
    pub fn post_advance(&self, task_id: &TaskId, signal: AdvanceSignal) {
        self.slots.lock().entry(task_id.clone()).or_default().post_advance(signal);
    }

    /// Post a `close` signal. This always wins over any pending advance the
    /// instant it's posted, not just at verifier-exit time.
    pub fn post_close(&self, task_id: &TaskId, signal: CloseSignal) {
        self.slots.lock().entry(task_id.clone()).or_default().post_close(signal);
    }

    /// Whether a task has any pending signal.
    pub fn has_pending(&self, task_id: &TaskId) -> bool {
        self.slots.lock().get(task_id).map(LifecycleSlot::has_pending).unwrap_or(false)
    }

    /// `handleExternalTaskClose(taskId)` (spec §4.G `tasks_request close`
    /// side effect): clear any lifecycle state for a task closed outside
    /// the verifier-exit path, so sticky-retry state doesn't leak.
    pub fn handle_external_task_close(&self, task_id: &TaskId) {
        self.slots.lock().remove(task_id);
    }

    /// Worker exited (spec §4.D `agent_end` "worker" branch): always
    /// transitions to spawning a verifier with the worker's last assistant
    /// text as kickoff context. Stopping any in-flight supervisor is the
    /// daemon's job (it owns the registry); this only decides the spawn.
    pub fn on_worker_exit(&self, task_id: TaskId, last_assistant_text: Option<String>) -> LifecycleDecision {
        LifecycleDecision::SpawnVerifier { task_id, context: last_assistant_text }
    }

    /// Verifier exited (spec §4.D `agent_end` "verifier" branch, §4.E
    /// "Signal routing"). Takes (reads-and-clears) the task's lifecycle
    /// slot and decides the next step, including the sticky-retry case.
    pub fn on_verifier_exit(&self, task_id: TaskId, recovery: impl FnOnce() -> RecoveryContext) -> LifecycleDecision {
        let taken = self.slots.lock().entry(task_id.clone()).or_default().take();
        match taken {
            TakenSignal::Close(close) => LifecycleDecision::Close { task_id, reason: close.reason },
            TakenSignal::Advance(advance) => match advance.action {
                AdvanceAction::Worker => LifecycleDecision::SpawnWorker { task_id, context: advance.message },
                AdvanceAction::Scout => LifecycleDecision::SpawnScout { task_id, context: advance.message },
                AdvanceAction::Defer => {
                    let mut comment = format!("Blocked by verifier advance_lifecycle. {}", advance.reason.unwrap_or_default());
                    if let Some(message) = advance.message {
                        comment.push_str(&format!("\nmessage: {message}"));
                    }
                    LifecycleDecision::Defer { task_id, comment }
                }
            },
            TakenSignal::None => LifecycleDecision::RespawnVerifier { task_id, recovery: recovery() },
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
