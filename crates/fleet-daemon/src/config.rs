//! Daemon configuration.
//!
//! Hierarchical merge: defaults < global file < project file < environment,
//! a layered merge so each source only needs to supply the fields it
//! wants to override.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::loop_::{clamp_poll_interval_ms, DEFAULT_POLL_INTERVAL_MS};
use fleet_engine::{resolve_auto_process_ready_tasks, AutoProcessSource};

pub const DEFAULT_STEERING_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_MAX_WORKERS: usize = 4;
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = fleet_core::DEFAULT_EVENT_RING;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, source: toml::de::Error },
    #[error("invalid thinking level {0:?}, expected one of off/minimal/low/medium/high/xhigh")]
    InvalidThinking(String),
}

/// Reasoning-effort knob per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingLevel {
    Off,
    Minimal,
    Low,
    Medium,
    High,
    Xhigh,
}

impl ThinkingLevel {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "minimal" => Ok(Self::Minimal),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "xhigh" => Ok(Self::Xhigh),
            other => Err(ConfigError::InvalidThinking(other.to_string())),
        }
    }
}

impl Default for ThinkingLevel {
    fn default() -> Self {
        Self::Medium
    }
}

/// A single, possibly-partial configuration layer, as loaded from a TOML
/// file or built from environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigLayer {
    pub poll_interval_ms: Option<u64>,
    pub steering_interval_ms: Option<u64>,
    pub max_workers: Option<usize>,
    pub event_buffer_size: Option<usize>,
    #[serde(default)]
    pub role_models: HashMap<String, String>,
    pub thinking: Option<String>,
    pub tools_allowlist: Option<Vec<String>>,
    pub auto_process_ready_tasks: Option<bool>,
}

impl ConfigLayer {
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })
    }
}

/// Fully-resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub poll_interval_ms: u64,
    pub steering_interval_ms: u64,
    pub max_workers: usize,
    pub event_buffer_size: usize,
    pub role_models: HashMap<String, String>,
    pub thinking: ThinkingLevel,
    pub tools_allowlist: Option<Vec<String>>,
    pub auto_process_ready_tasks: bool,
    pub auto_process_source: AutoProcessSource,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            steering_interval_ms: DEFAULT_STEERING_INTERVAL_MS,
            max_workers: DEFAULT_MAX_WORKERS,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            role_models: HashMap::new(),
            thinking: ThinkingLevel::default(),
            tools_allowlist: None,
            auto_process_ready_tasks: true,
            auto_process_source: AutoProcessSource::Default,
        }
    }
}

impl Config {
    /// Apply a layer on top of the current config; fields the layer leaves
    /// `None` are untouched.
    fn apply(&mut self, layer: ConfigLayer) -> Result<(), ConfigError> {
        if let Some(v) = layer.poll_interval_ms {
            self.poll_interval_ms = clamp_poll_interval_ms(v);
        }
        if let Some(v) = layer.steering_interval_ms {
            self.steering_interval_ms = v;
        }
        if let Some(v) = layer.max_workers {
            self.max_workers = v;
        }
        if let Some(v) = layer.event_buffer_size {
            self.event_buffer_size = v;
        }
        for (role, model) in layer.role_models {
            self.role_models.insert(role, model);
        }
        if let Some(raw) = layer.thinking {
            self.thinking = ThinkingLevel::parse(&raw)?;
        }
        if let Some(v) = layer.tools_allowlist {
            self.tools_allowlist = Some(v);
        }
        if let Some(v) = layer.auto_process_ready_tasks {
            self.auto_process_ready_tasks = v;
        }
        Ok(())
    }

    /// Merge `defaults < global < project < environment`, in that order.
    /// `auto_process_ready_tasks` is re-resolved last against the
    /// environment so its precedence rule (env beats persisted config,
    /// spec §4.F) holds even though it's also a plain layered field.
    pub fn merge(global: Option<ConfigLayer>, project: Option<ConfigLayer>, env: ConfigLayer) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let persisted_auto_process = project.as_ref().and_then(|l| l.auto_process_ready_tasks).or_else(|| global.as_ref().and_then(|l| l.auto_process_ready_tasks));

        if let Some(layer) = global {
            config.apply(layer)?;
        }
        if let Some(layer) = project {
            config.apply(layer)?;
        }
        config.apply(env.clone())?;

        let (auto_process, source) = resolve_auto_process_ready_tasks(env.auto_process_ready_tasks_env().as_deref(), persisted_auto_process);
        config.auto_process_ready_tasks = auto_process;
        config.auto_process_source = source;

        Ok(config)
    }
}

impl ConfigLayer {
    /// The raw environment override string, if any, used only to preserve
    /// the distinction between "unset" and "explicitly set" for
    /// `resolve_auto_process_ready_tasks`'s source tracking.
    fn auto_process_ready_tasks_env(&self) -> Option<String> {
        self.auto_process_ready_tasks.map(|v| v.to_string())
    }
}

/// Build the environment-override layer:
/// `FLEET_POLL_INTERVAL_MS`, `FLEET_STEERING_INTERVAL_MS`,
/// `FLEET_MAX_WORKERS`, `FLEET_EVENT_BUFFER_SIZE`, `FLEET_THINKING`,
/// `FLEET_TOOLS_ALLOWLIST` (comma-separated), `FLEET_AUTO_PROCESS_READY_TASKS`.
pub fn env_layer() -> ConfigLayer {
    ConfigLayer {
        poll_interval_ms: env_u64("FLEET_POLL_INTERVAL_MS"),
        steering_interval_ms: env_u64("FLEET_STEERING_INTERVAL_MS"),
        max_workers: env_usize("FLEET_MAX_WORKERS"),
        event_buffer_size: env_usize("FLEET_EVENT_BUFFER_SIZE"),
        role_models: HashMap::new(),
        thinking: std::env::var("FLEET_THINKING").ok(),
        tools_allowlist: std::env::var("FLEET_TOOLS_ALLOWLIST")
            .ok()
            .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()),
        auto_process_ready_tasks: std::env::var("FLEET_AUTO_PROCESS_READY_TASKS").ok().and_then(|raw| parse_bool_env(&raw)),
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

fn parse_bool_env(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
