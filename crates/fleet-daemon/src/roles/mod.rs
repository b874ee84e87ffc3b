//! Role Registry — spec §4.I.
//!
//! Validates a role-config document, merges layered sources (built-in
//! roles, project `roles.toml`, environment overrides), and resolves
//! prompt/extension paths and permissions for a role. Later layers
//! override earlier ones by role name: config layering is an override
//! chain, not a namespace merge.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use fleet_core::RoleId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ROLE_CONFIG_VERSION: &str = "1.0";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoleConfigError {
    #[error("unsupported role config version {0:?}, expected {ROLE_CONFIG_VERSION:?}")]
    UnsupportedVersion(String),
    #[error("profile must be non-empty")]
    EmptyProfile,
    #[error("role config must declare at least one role")]
    NoRoles,
    #[error("role {role} can_spawn references undeclared role {target}")]
    UnknownSpawnTarget { role: String, target: String },
    #[error("role spawn graph has a cycle through {0:?}")]
    SpawnCycle(Vec<String>),
    #[error("role {role} has a non-positive steering interval")]
    InvalidSteeringInterval { role: String },
    #[error("role {role} extension entry {index} has an empty path")]
    EmptyExtensionPath { role: String, index: usize },
    #[error("extension path for {name} could not be resolved")]
    ExtensionNotFound { name: String },
    #[error("permissions override is not valid JSON: {0}")]
    InvalidPermissionsJson(String),
}

pub type RoleConfigResult<T> = Result<T, RoleConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteeringConfig {
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionEntry {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoleDef {
    pub category: String,
    pub rendering: String,
    #[serde(default)]
    pub can_modify_files: bool,
    #[serde(default)]
    pub can_close_task: bool,
    #[serde(default)]
    pub can_advance_lifecycle: bool,
    #[serde(default)]
    pub can_spawn: BTreeSet<String>,
    pub steering: Option<SteeringConfig>,
    pub prompt: Option<String>,
    #[serde(default)]
    pub extensions: Vec<ExtensionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    pub version: String,
    pub profile: String,
    pub roles: IndexMap<String, RoleDef>,
}

impl RoleDef {
    fn rendering(&self) -> fleet_core::Rendering {
        match self.rendering.as_str() {
            "markdown" => fleet_core::Rendering::Markdown,
            "diff" => fleet_core::Rendering::Diff,
            _ => fleet_core::Rendering::Default,
        }
    }

    fn to_capabilities(&self) -> fleet_core::Capabilities {
        fleet_core::Capabilities {
            category: self.category.clone(),
            rendering: self.rendering(),
            can_modify_files: self.can_modify_files,
            can_close_task: self.can_close_task,
            can_advance_lifecycle: self.can_advance_lifecycle,
            can_spawn: self.can_spawn.iter().map(|name| RoleId::from_str_id(name)).collect(),
        }
    }
}

impl RoleConfig {
    /// An empty config carrying only the built-in capability table, used
    /// when a project declares no `roles.toml` of its own.
    pub fn builtin_only() -> Self {
        Self { version: ROLE_CONFIG_VERSION.to_string(), profile: "default".to_string(), roles: IndexMap::new() }
    }

    /// Capability lookup for `role`: an explicit entry in this config wins,
    /// falling back to the built-in table, then to the generic custom-role
    /// default (spec §3, §4.I).
    pub fn capabilities_for(&self, role: &RoleId) -> fleet_core::Capabilities {
        if let Some(def) = self.roles.get(role.as_str()) {
            return def.to_capabilities();
        }
        fleet_core::Capabilities::for_builtin(role).unwrap_or_else(fleet_core::Capabilities::default_custom)
    }
}

/// Validate schema invariants (spec §4.I): version, profile, role presence,
/// per-role `canSpawn` closure/acyclicity, steering interval, extension
/// paths.
pub fn validate_role_config(config: &RoleConfig) -> RoleConfigResult<()> {
    if config.version != ROLE_CONFIG_VERSION {
        return Err(RoleConfigError::UnsupportedVersion(config.version.clone()));
    }
    if config.profile.trim().is_empty() {
        return Err(RoleConfigError::EmptyProfile);
    }
    if config.roles.is_empty() {
        return Err(RoleConfigError::NoRoles);
    }

    for (name, def) in &config.roles {
        for target in &def.can_spawn {
            if !config.roles.contains_key(target) {
                return Err(RoleConfigError::UnknownSpawnTarget { role: name.clone(), target: target.clone() });
            }
        }
        if let Some(steering) = &def.steering {
            if steering.interval_ms == 0 {
                return Err(RoleConfigError::InvalidSteeringInterval { role: name.clone() });
            }
        }
        for (index, extension) in def.extensions.iter().enumerate() {
            if extension.path.trim().is_empty() {
                return Err(RoleConfigError::EmptyExtensionPath { role: name.clone(), index });
            }
        }
    }

    detect_spawn_cycle(config)
}

fn detect_spawn_cycle(config: &RoleConfig) -> RoleConfigResult<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }
    let mut marks: HashMap<&str, Mark> = HashMap::new();

    fn visit<'a>(
        name: &'a str,
        config: &'a RoleConfig,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<String>,
    ) -> RoleConfigResult<()> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let mut cycle = stack.clone();
                cycle.push(name.to_string());
                return Err(RoleConfigError::SpawnCycle(cycle));
            }
            None => {}
        }
        marks.insert(name, Mark::Visiting);
        stack.push(name.to_string());
        if let Some(def) = config.roles.get(name) {
            for target in &def.can_spawn {
                visit(target, config, marks, stack)?;
            }
        }
        stack.pop();
        marks.insert(name, Mark::Done);
        Ok(())
    }

    for name in config.roles.keys() {
        let mut stack = Vec::new();
        visit(name, config, &mut marks, &mut stack)?;
    }
    Ok(())
}

/// Layered merge: built-in roles < project `roles.toml` < environment
/// overrides, later layers winning per role name. Later layers fully
/// replace the earlier role definition rather than merging field-by-field.
pub fn merge_role_layers(layers: impl IntoIterator<Item = RoleConfig>) -> Option<RoleConfig> {
    let mut merged: Option<RoleConfig> = None;
    for layer in layers {
        match &mut merged {
            None => merged = Some(layer),
            Some(base) => {
                base.version = layer.version;
                base.profile = layer.profile;
                for (name, def) in layer.roles {
                    base.roles.insert(name, def);
                }
            }
        }
    }
    merged
}

/// Prompt resolution (spec §4.I): explicit path wins, else the built-in
/// path for the role, else no prompt.
pub fn resolve_prompt(explicit: Option<&str>, builtin: Option<&Path>) -> Option<PathBuf> {
    explicit.map(PathBuf::from).or_else(|| builtin.map(Path::to_path_buf))
}

/// Extension path resolution order (spec §4.I): named-entry indirection →
/// built-in → cwd-relative → absolute → error.
pub fn resolve_extension_path(
    entry: &ExtensionEntry,
    named: &HashMap<String, PathBuf>,
    builtin: &HashMap<String, PathBuf>,
    cwd: &Path,
) -> RoleConfigResult<PathBuf> {
    if let Some(path) = named.get(&entry.name) {
        return Ok(path.clone());
    }
    if let Some(path) = builtin.get(&entry.name) {
        return Ok(path.clone());
    }
    let candidate = Path::new(&entry.path);
    if candidate.is_absolute() {
        return Ok(candidate.to_path_buf());
    }
    let relative = cwd.join(candidate);
    if relative.exists() {
        return Ok(relative);
    }
    Err(RoleConfigError::ExtensionNotFound { name: entry.name.clone() })
}

/// Default permission allowlist applied when no per-role override is
/// configured (spec §4.I "fail-closed").
pub fn default_permissions_allowlist() -> Vec<String> {
    vec!["read_file".to_string(), "write_file".to_string(), "run_command".to_string(), "search".to_string()]
}

/// Resolve the effective permission allowlist for a role, applying an
/// optional environment override. The override must be a JSON array of
/// strings; any parse failure fails closed to an empty allowlist rather
/// than silently granting the default set.
pub fn resolve_permissions(env_override: Option<&str>) -> RoleConfigResult<Vec<String>> {
    let Some(raw) = env_override else {
        return Ok(default_permissions_allowlist());
    };
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| RoleConfigError::InvalidPermissionsJson(e.to_string()))?;
    let array = value.as_array().ok_or_else(|| RoleConfigError::InvalidPermissionsJson("expected a JSON array".to_string()))?;
    array
        .iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(|| RoleConfigError::InvalidPermissionsJson("expected string entries".to_string())))
        .collect()
}

/// Whether `role` (a free-form config key) corresponds to one of the
/// built-in [`RoleId`] variants, for cross-checking config against the
/// fixed capability table in `fleet-core`.
pub fn is_builtin_role_name(name: &str) -> bool {
    RoleId::from_str_id(name).is_builtin()
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
