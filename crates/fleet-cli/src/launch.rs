//! `fleet launch` — spec §6 CLI surface.
//!
//! Two modes:
//!
//! - Default (no `--pipe`): spawn the `fleetd` binary in the foreground and
//!   wait on it, propagating its exit status.
//! - `--pipe`: run the Agent Loop in-process to a fixed point instead of
//!   forever, emitting one JSON line per lifecycle event to stdout for
//!   scripted/piped consumption, then exit — no persistent daemon, no IPC
//!   socket. Drains while there is work; once a poll finds nothing ready
//!   and nothing active it retries exactly once after one poll interval
//!   (Open Question 3) before declaring completion.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result};
use fleet_core::{SystemClock, UuidIdGen};
use fleet_daemon::config::{env_layer, Config, ConfigLayer};
use fleet_daemon::loop_::AgentLoop;
use fleet_daemon::registry::Registry;
use fleet_daemon::roles::{merge_role_layers, validate_role_config, RoleConfig};
use fleet_daemon::spawner::ProcessSpawner;
use fleet_daemon::EnvLauncher;
use fleet_engine::{AutonomousWorkflow, InteractiveWorkflow, LifecycleEngine, WorkflowEngine};
use fleet_store::FileTaskStore;
use serde_json::json;

use crate::exit_error::ExitError;

fn load_config(project_path: &Path) -> Result<Config> {
    let global = std::env::var("FLEET_GLOBAL_CONFIG")
        .ok()
        .map(PathBuf::from)
        .filter(|p| p.exists())
        .map(|p| ConfigLayer::from_file(&p))
        .transpose()
        .context("failed to load global config")?;

    let project_config_path = project_path.join(".fleet").join("config.toml");
    let project = project_config_path
        .exists()
        .then(|| ConfigLayer::from_file(&project_config_path))
        .transpose()
        .context("failed to load project config")?;

    Config::merge(global, project, env_layer()).context("failed to merge configuration layers")
}

/// Load and validate the Role Registry the same way `fleetd` does: built-in
/// table layered with `.fleet/roles.toml` when present, failing outright on
/// an unknown role reference or a `canSpawn` cycle.
fn load_role_config(project_path: &Path) -> Result<Arc<RoleConfig>> {
    let roles_path = project_path.join(".fleet").join("roles.toml");
    if !roles_path.exists() {
        return Ok(Arc::new(RoleConfig::builtin_only()));
    }

    let raw = std::fs::read_to_string(&roles_path).with_context(|| format!("failed to read {}", roles_path.display()))?;
    let project: RoleConfig = toml::from_str(&raw).with_context(|| format!("failed to parse {}", roles_path.display()))?;
    validate_role_config(&project).with_context(|| format!("invalid role config in {}", roles_path.display()))?;

    let merged = merge_role_layers([RoleConfig::builtin_only(), project])
        .context("role layer merge produced no config")?;
    Ok(Arc::new(merged))
}

/// Locate the `fleetd` binary: an explicit override, then a sibling of this
/// executable, then a bare PATH lookup.
fn find_fleetd_binary() -> PathBuf {
    if let Ok(path) = std::env::var("FLEET_DAEMON_BIN") {
        return PathBuf::from(path);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("fleetd");
            if sibling.exists() {
                return sibling;
            }
        }
    }
    PathBuf::from("fleetd")
}

/// Spawn `fleetd` in the foreground and wait for it to exit, propagating its
/// exit code (spec §6: exit 0 on graceful shutdown, 1 on uncaught error).
pub async fn launch_daemon(project_path: &Path) -> Result<()> {
    let binary = find_fleetd_binary();
    let status = tokio::process::Command::new(&binary)
        .arg(project_path)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .with_context(|| format!("failed to launch daemon binary {}", binary.display()))?;

    if status.success() {
        Ok(())
    } else {
        Err(ExitError::new(status.code().unwrap_or(1), format!("fleetd exited with {status}")).into())
    }
}

/// Run the Agent Loop to a fixed point in-process, emitting one JSON event
/// per line to stdout.
pub async fn launch_pipe(project_path: &Path) -> Result<()> {
    let config = load_config(project_path)?;
    let roles = load_role_config(project_path)?;

    let agent_binary = std::env::var("FLEET_AGENT_BIN").context("FLEET_AGENT_BIN must name the agent subprocess binary")?;
    let launcher = EnvLauncher { binary: PathBuf::from(agent_binary), project_path: project_path.to_path_buf(), roles: roles.clone() };

    let data_path = std::env::var("FLEET_DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| project_path.join(".fleet").join("state.json"));
    let store = Arc::new(FileTaskStore::new(data_path));
    let registry = Arc::new(Registry::new());
    let lifecycle = Arc::new(LifecycleEngine::new());

    let (outcome_tx, mut outcome_rx) = tokio::sync::mpsc::unbounded_channel();
    let spawner = Arc::new(ProcessSpawner::new(store.clone(), SystemClock, registry.clone(), launcher, Arc::new(UuidIdGen), outcome_tx));
    let workflow: Arc<dyn WorkflowEngine> =
        if config.auto_process_ready_tasks { Arc::new(AutonomousWorkflow) } else { Arc::new(InteractiveWorkflow::new()) };
    let agent_loop = Arc::new(AgentLoop::new(store, spawner, registry, lifecycle, roles, workflow, config.max_workers));

    for task_id in agent_loop.reconcile_on_startup().await.context("startup reconciliation failed")? {
        emit(&json!({"type": "resumed", "task_id": task_id.as_str()}));
    }

    let poll_interval = agent_loop.poll_interval();
    let mut retried_once = false;

    loop {
        let started = agent_loop.start_tasks(usize::MAX).await.context("dispatch failed")?;
        for task_id in &started {
            emit(&json!({"type": "task_started", "task_id": task_id.as_str()}));
        }

        let idle = started.is_empty() && agent_loop.registry().get_active().is_empty();
        if idle {
            if retried_once {
                emit(&json!({"type": "pipe_complete"}));
                return Ok(());
            }
            retried_once = true;
            tokio::time::sleep(poll_interval).await;
            continue;
        }
        retried_once = false;

        match tokio::time::timeout(poll_interval, outcome_rx.recv()).await {
            Ok(Some((local_id, outcome))) => {
                emit(&json!({"type": "agent_outcome", "agent_id": local_id.as_str(), "outcome": format!("{outcome:?}")}));
                agent_loop.handle_terminal_outcome(&local_id, outcome).await.context("failed to handle terminal outcome")?;
            }
            Ok(None) => return Ok(()),
            Err(_elapsed) => {}
        }
    }
}

fn emit(event: &serde_json::Value) {
    println!("{event}");
}
