#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleet-daemon: the long-running process that owns the Agent Registry, the
//! RPC Handler Manager, the Agent Loop, the Role Registry, and the IPC
//! Control Plane (spec §4.C, §4.D, §4.G, §4.H, §4.I). Scheduling and
//! lifecycle *decisions* live in `fleet-engine`; this crate executes them
//! against real subprocesses and a real store.

pub mod complaints;
pub mod config;
pub mod env_launcher;
pub mod ipc;
pub mod loop_;
pub mod registry;
pub mod roles;
pub mod rpc;
pub mod spawner;

pub use complaints::{Complaint, ComplaintBook};
pub use config::{Config, ConfigError, ConfigLayer, ThinkingLevel};
pub use env_launcher::EnvLauncher;
pub use loop_::{clamp_poll_interval_ms, AgentLoop, LoopError, LoopResult, DEFAULT_POLL_INTERVAL_MS, MIN_POLL_INTERVAL_MS};
pub use registry::{
    is_worker_kind, pair_tool_calls, ActiveSummary, HistoryResolution, MessageHistory, Registry, RegistryError, RegistryResult,
    ToolCall,
};
pub use roles::{
    default_permissions_allowlist, is_builtin_role_name, merge_role_layers, resolve_extension_path, resolve_permissions,
    resolve_prompt, validate_role_config, ExtensionEntry, RoleConfig, RoleConfigError, RoleConfigResult, RoleDef,
    SteeringConfig, ROLE_CONFIG_VERSION,
};
pub use rpc::{handle_event, usage_delta_from_event, AgentEvent, AgentEventKind, DebounceOutcome, Debouncer, EventParseError, TerminalOutcome};
pub use spawner::{AgentSpawner, Launcher, SpawnError, SpawnResult, SubprocessHandle};
