//! Agent spawner abstraction — the Loop's boundary to subprocess
//! management. Spawning a real subprocess and attaching the RPC event
//! stream is infrastructure this crate deliberately keeps behind a trait
//! so `fleet-daemon`'s scheduling logic stays testable without a real
//! agent binary.

pub mod process;

use std::time::Duration;

use async_trait::async_trait;
use fleet_core::{AgentLocalId, RoleId, TaskId};
use thiserror::Error;

pub use process::{Launcher, ProcessSpawner, SubprocessHandle};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpawnError {
    #[error("spawn failed: {0}")]
    Failed(String),
    #[error("agent {0} not found")]
    NotFound(String),
}

pub type SpawnResult<T> = Result<T, SpawnError>;

/// Spawns and tears down role subprocesses. [`process::ProcessSpawner`] is
/// the real implementation, forking a subprocess whose argv the
/// [`Launcher`] supplies, wiring its stdout event stream into
/// `fleet-daemon::rpc::handle_event`, and registering the resulting record
/// in the [`crate::registry::Registry`].
#[async_trait]
pub trait AgentSpawner: Send + Sync {
    /// Spawn `role` bound to `task_id`, with `context` as the kickoff
    /// message (spec §4.E replace-agent policy, §4.D worker->verifier
    /// handoff). `tasks_agent_id` is the store-persisted agent id this
    /// subprocess is bound to, threaded through so terminal events can be
    /// recorded against it (spec §2 row C dual-keying).
    async fn spawn(
        &self,
        role: RoleId,
        task_id: &TaskId,
        context: Option<String>,
        tasks_agent_id: Option<String>,
    ) -> SpawnResult<AgentLocalId>;

    /// Stop a running agent gracefully, escalating to a forced kill after
    /// `grace` elapses (spec §5 "Cancellation and timeouts").
    async fn stop(&self, agent_id: &AgentLocalId, grace: Duration) -> SpawnResult<()>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use std::sync::Mutex;

    use super::*;

    /// One recorded call against [`FakeAgentSpawner`], for test assertions.
    #[derive(Debug, Clone, PartialEq)]
    pub enum SpawnerCall {
        Spawn { role: RoleId, task_id: TaskId, context: Option<String>, tasks_agent_id: Option<String> },
        Stop { agent_id: AgentLocalId },
    }

    /// Deterministic test double: hands back sequential local ids and
    /// records every call for assertions.
    #[derive(Default)]
    pub struct FakeAgentSpawner {
        calls: Mutex<Vec<SpawnerCall>>,
        next_id: Mutex<u64>,
    }

    impl FakeAgentSpawner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<SpawnerCall> {
            self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }
    }

    #[async_trait]
    impl AgentSpawner for FakeAgentSpawner {
        async fn spawn(
            &self,
            role: RoleId,
            task_id: &TaskId,
            context: Option<String>,
            tasks_agent_id: Option<String>,
        ) -> SpawnResult<AgentLocalId> {
            let mut next_id = self.next_id.lock().unwrap_or_else(|e| e.into_inner());
            let id = AgentLocalId::new(format!("fake-agent-{next_id}"));
            *next_id += 1;
            self.calls
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(SpawnerCall::Spawn { role, task_id: task_id.clone(), context, tasks_agent_id });
            Ok(id)
        }

        async fn stop(&self, agent_id: &AgentLocalId, _grace: Duration) -> SpawnResult<()> {
            self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(SpawnerCall::Stop { agent_id: agent_id.clone() });
            Ok(())
        }
    }
}
