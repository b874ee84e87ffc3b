//! `fleetd` — the long-running orchestrator daemon (spec §4.C/§6).
//!
//! Wires the Task Store, Role Registry, Lifecycle Engine, Agent Spawner,
//! Agent Loop, and IPC Control Plane together and runs until a shutdown
//! signal arrives. This daemon has no subcommands of its own (that surface
//! belongs to the `fleet` CLI), so `main` takes a single optional
//! positional project path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fleet_core::{SystemClock, UuidIdGen};
use fleet_daemon::config::{env_layer, Config, ConfigLayer};
use fleet_daemon::ipc;
use fleet_daemon::loop_::AgentLoop;
use fleet_daemon::registry::Registry;
use fleet_daemon::roles::{merge_role_layers, validate_role_config, RoleConfig};
use fleet_daemon::spawner::ProcessSpawner;
use fleet_daemon::EnvLauncher;
use fleet_engine::{AutonomousWorkflow, InteractiveWorkflow, LifecycleEngine, WorkflowEngine};
use fleet_store::FileTaskStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// The (currently empty) list of error messages treated as benign exit
/// conditions. This headless daemon has no terminal-resize-style race to
/// swallow, but the hook is kept for parity with the source system's error
/// taxonomy (spec §7) and so future benign cases have somewhere to land.
const BENIGN_PATTERNS: &[&str] = &[];

fn is_benign(err: &anyhow::Error) -> bool {
    let text = err.to_string();
    BENIGN_PATTERNS.iter().any(|pattern| text.contains(pattern))
}

fn main() {
    let _log_guard = setup_logging();
    std::panic::set_hook(Box::new(|info| {
        error!(panic = %info, "fleetd panicked");
    }));

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("FATAL: failed to start the tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(run()) {
        if !is_benign(&err) {
            error!(error = %format!("{err:#}"), "fleetd exiting with error");
        }
        std::process::exit(1);
    }
}

/// Initialize tracing. Logs to stdout, plus a daily-rolling file when
/// `FLEET_LOG_FILE` is set; falls back to stdout-only with a warning if the
/// log directory can't be created, mirroring `clawd`'s never-panic-on-a-
/// bad-log-path behavior.
fn setup_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = std::env::var("FLEET_LOG").unwrap_or_else(|_| "info".to_string());

    let Ok(log_file) = std::env::var("FLEET_LOG_FILE") else {
        tracing_subscriber::fmt().with_env_filter(level).compact().init();
        return None;
    };
    let path = PathBuf::from(log_file);
    let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let filename = path.file_name().map(ToOwned::to_owned).unwrap_or_else(|| std::ffi::OsString::from("fleetd.log"));

    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("warn: could not create log directory '{}': {e} — falling back to stdout", dir.display());
        tracing_subscriber::fmt().with_env_filter(level).compact().init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(dir, filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(level))
        .with(tracing_subscriber::fmt::layer().compact())
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
        .init();

    Some(guard)
}

/// Resolve the project path from the first positional argument, defaulting
/// to the current directory.
fn project_path() -> Result<PathBuf> {
    match std::env::args().nth(1) {
        Some(arg) => Ok(PathBuf::from(arg)),
        None => std::env::current_dir().context("failed to determine current directory"),
    }
}

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

/// Load and validate the Role Registry (spec §4.I): the built-in table,
/// layered with `.fleet/roles.toml` when the project declares one. An
/// unknown role reference or a `canSpawn` cycle fails startup outright
/// rather than silently falling back to built-in-only behavior.
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

async fn run() -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "fleetd starting");

    let project_path = project_path()?;
    let config = load_config(&project_path)?;
    info!(
        project_path = %project_path.display(),
        max_workers = config.max_workers,
        poll_interval_ms = config.poll_interval_ms,
        "configuration loaded"
    );

    let roles = load_role_config(&project_path)?;
    info!(profile = %roles.profile, role_count = roles.roles.len(), "role registry loaded");

    let agent_binary = std::env::var("FLEET_AGENT_BIN").context("FLEET_AGENT_BIN must name the agent subprocess binary")?;
    let launcher = EnvLauncher { binary: PathBuf::from(agent_binary), project_path: project_path.clone(), roles: roles.clone() };

    let data_path = std::env::var("FLEET_DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| project_path.join(".fleet").join("state.json"));
    let store = Arc::new(FileTaskStore::new(data_path));
    let registry = Arc::new(Registry::new());
    let lifecycle = Arc::new(LifecycleEngine::new());

    let (outcome_tx, mut outcome_rx) = tokio::sync::mpsc::unbounded_channel();
    let spawner = Arc::new(ProcessSpawner::new(store.clone(), SystemClock, registry.clone(), launcher, Arc::new(UuidIdGen), outcome_tx));

    let workflow: Arc<dyn WorkflowEngine> =
        if config.auto_process_ready_tasks { Arc::new(AutonomousWorkflow) } else { Arc::new(InteractiveWorkflow::new()) };
    info!(auto_process_ready_tasks = config.auto_process_ready_tasks, "workflow engine selected");

    let agent_loop = Arc::new(AgentLoop::new(store.clone(), spawner, registry, lifecycle, roles, workflow, config.max_workers));

    let resumed = agent_loop.reconcile_on_startup().await.context("startup reconciliation failed")?;
    if !resumed.is_empty() {
        info!(count = resumed.len(), "resumed orphaned in-progress tasks");
    }

    let shutdown = CancellationToken::new();

    let outcomes_task = {
        let agent_loop = agent_loop.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => return,
                    received = outcome_rx.recv() => {
                        let Some((local_id, outcome)) = received else { return };
                        if let Err(e) = agent_loop.handle_terminal_outcome(&local_id, outcome).await {
                            warn!(agent_id = %local_id, error = %e, "failed to handle terminal outcome");
                        }
                    }
                }
            }
        })
    };

    let poll_task = {
        let agent_loop = agent_loop.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => return,
                    () = tokio::time::sleep(agent_loop.poll_interval()) => {
                        if !agent_loop.is_paused() {
                            if let Err(e) = agent_loop.start_tasks(usize::MAX).await {
                                warn!(error = %e, "periodic dispatch failed");
                            }
                        }
                    }
                }
            }
        })
    };

    let socket_path = ipc::default_socket_path(&project_path);
    let listener = ipc::bind(&socket_path).with_context(|| format!("failed to bind control socket at {}", socket_path.display()))?;
    info!(socket = %socket_path.display(), "control socket bound");

    let serve_task = {
        let agent_loop = agent_loop.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { ipc::serve(listener, agent_loop, SystemClock, shutdown).await })
    };

    wait_for_shutdown_signal().await;
    info!("shutdown signal received");
    shutdown.cancel();

    let stopped = agent_loop.stop_all_agents_and_pause().await.context("failed to stop agents during shutdown")?;
    info!(stopped, "stopped active agents");

    let _ = tokio::time::timeout(Duration::from_secs(5), serve_task).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), poll_task).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), outcomes_task).await;

    info!("fleetd exiting cleanly");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let Ok(mut sigterm) = signal(SignalKind::terminate()) else {
        let _ = tokio::signal::ctrl_c().await;
        return;
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_error_matches_the_empty_benign_table() {
        let samples = [anyhow::anyhow!("boom"), anyhow::anyhow!("control socket accept error"), anyhow::anyhow!("")];
        for sample in samples {
            assert!(!is_benign(&sample));
        }
    }
}
