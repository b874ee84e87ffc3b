//! Real subprocess-backed [`AgentSpawner`] — forks the agent binary the
//! Role Registry supplies, streams its stdout event-by-event into
//! `fleet-daemon::rpc::handle_event`, and forwards terminal outcomes over a
//! channel for the Agent Loop to act on. No readiness socket, no health
//! polling: the subprocess protocol is stdout-only line-delimited JSON
//! (spec §6), and the subprocess binary itself stays out of scope, so
//! [`Launcher`] is the one seam a real deployment fills in.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleet_core::{AgentLocalId, Clock, IdGen, RoleId, TaskId};
use fleet_store::TaskStore;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use super::{AgentSpawner, SpawnError, SpawnResult};
use crate::registry::Registry;
use crate::rpc::{self, TerminalOutcome};

/// Supplies the argv for a role's subprocess (spec §6: "never hard-coding
/// its argv beyond what the Role Registry supplies"). The concrete binary a
/// launcher points at is out of this crate's scope.
pub trait Launcher: Send + Sync {
    fn command_for(&self, role: &RoleId, task_id: &TaskId, context: Option<&str>) -> Command;
}

/// A running subprocess's controllable surface, narrower than
/// [`AgentSpawner`] so a non-OS-process test double only needs this much.
#[async_trait]
pub trait SubprocessHandle: Send + Sync {
    async fn kill(&self, grace: Duration);
}

#[async_trait]
impl SubprocessHandle for tokio::sync::Mutex<Child> {
    async fn kill(&self, grace: Duration) {
        let mut child = self.lock().await;
        #[cfg(unix)]
        if let Some(id) = child.id() {
            let _ = nix::sys::signal::kill(nix::unistd::Pid::from_raw(id as i32), nix::sys::signal::Signal::SIGTERM);
        }
        if tokio::time::timeout(grace, child.wait()).await.is_err() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }
}

/// Forks a subprocess per spawn and wires its stdout into the RPC Handler
/// Manager (spec §4.D, §5 "one reader task per spawned agent").
pub struct ProcessSpawner<S, C, L> {
    store: Arc<S>,
    clock: C,
    registry: Arc<Registry>,
    launcher: L,
    id_gen: Arc<dyn IdGen>,
    outcomes: UnboundedSender<(AgentLocalId, TerminalOutcome)>,
    handles: Mutex<HashMap<AgentLocalId, Arc<dyn SubprocessHandle>>>,
}

impl<S, C, L> ProcessSpawner<S, C, L>
where
    S: TaskStore + 'static,
    C: Clock,
    L: Launcher,
{
    pub fn new(
        store: Arc<S>,
        clock: C,
        registry: Arc<Registry>,
        launcher: L,
        id_gen: Arc<dyn IdGen>,
        outcomes: UnboundedSender<(AgentLocalId, TerminalOutcome)>,
    ) -> Self {
        Self { store, clock, registry, launcher, id_gen, outcomes, handles: Mutex::new(HashMap::new()) }
    }
}

#[async_trait]
impl<S, C, L> AgentSpawner for ProcessSpawner<S, C, L>
where
    S: TaskStore + 'static,
    C: Clock,
    L: Launcher,
{
    async fn spawn(
        &self,
        role: RoleId,
        task_id: &TaskId,
        context: Option<String>,
        tasks_agent_id: Option<String>,
    ) -> SpawnResult<AgentLocalId> {
        let local_id = AgentLocalId::new(self.id_gen.generate());

        let mut command = self.launcher.command_for(&role, task_id, context.as_deref());
        command.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|e| SpawnError::Failed(format!("failed to spawn {role} for {task_id}: {e}")))?;
        let stdout = child.stdout.take().ok_or_else(|| SpawnError::Failed("subprocess has no stdout pipe".to_string()))?;

        let handle = Arc::new(tokio::sync::Mutex::new(child));
        self.handles.lock().insert(local_id.clone(), handle.clone());

        info!(agent_id = %local_id, %role, %task_id, "spawned agent subprocess");

        let registry = self.registry.clone();
        let store = self.store.clone();
        let clock = self.clock.clone();
        let outcomes = self.outcomes.clone();
        let reader_id = local_id.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let event = match rpc::AgentEvent::parse(&line) {
                            Ok(event) => event.into_value(),
                            Err(err) => {
                                warn!(agent_id = %reader_id, error = %err, %line, "malformed subprocess event line");
                                continue;
                            }
                        };
                        if let Some(outcome) =
                            rpc::handle_event(&registry, store.as_ref(), &clock, &reader_id, tasks_agent_id.as_deref(), event).await
                        {
                            if outcomes.send((reader_id.clone(), outcome)).is_err() {
                                debug!(agent_id = %reader_id, "terminal outcome dropped: receiver gone");
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!(agent_id = %reader_id, error = %err, "subprocess stdout read error");
                        break;
                    }
                }
            }
        });

        Ok(local_id)
    }

    async fn stop(&self, agent_id: &AgentLocalId, grace: Duration) -> SpawnResult<()> {
        let handle = self.handles.lock().remove(agent_id).ok_or_else(|| SpawnError::NotFound(agent_id.to_string()))?;
        handle.kill(grace).await;
        Ok(())
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
