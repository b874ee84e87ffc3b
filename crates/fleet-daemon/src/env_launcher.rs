//! [`EnvLauncher`] — the one concrete [`crate::spawner::Launcher`] this
//! workspace ships, shared by `fleetd` and `fleet`'s `--pipe` drain mode so
//! neither binary hand-rolls its own copy. Reads the agent binary path from
//! `FLEET_AGENT_BIN` and invokes it with `--role`/`--task`, passing a
//! kickoff context (if any) via `FLEET_TASK_CONTEXT`, never assuming
//! anything about the binary's argument parser beyond what the Role
//! Registry supplies (spec §6).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use fleet_core::{RoleId, TaskId};
use tokio::process::Command;
use tracing::warn;

use crate::roles::{resolve_extension_path, resolve_prompt, RoleConfig};
use crate::spawner::Launcher;

pub struct EnvLauncher {
    pub binary: PathBuf,
    pub project_path: PathBuf,
    pub roles: Arc<RoleConfig>,
}

impl Launcher for EnvLauncher {
    fn command_for(&self, role: &RoleId, task_id: &TaskId, context: Option<&str>) -> Command {
        let mut command = Command::new(&self.binary);
        command.arg("--role").arg(role.as_str()).arg("--task").arg(task_id.as_str()).current_dir(&self.project_path);
        if let Some(context) = context {
            command.env("FLEET_TASK_CONTEXT", context);
        }

        if let Some(def) = self.roles.roles.get(role.as_str()) {
            if let Some(prompt) = resolve_prompt(def.prompt.as_deref(), None) {
                command.env("FLEET_ROLE_PROMPT", prompt);
            }
            let named = HashMap::new();
            let builtin = HashMap::new();
            let resolved: Vec<String> = def
                .extensions
                .iter()
                .filter_map(|entry| match resolve_extension_path(entry, &named, &builtin, &self.project_path) {
                    Ok(path) => Some(path.to_string_lossy().into_owned()),
                    Err(err) => {
                        warn!(role = %role, extension = %entry.name, error = %err, "failed to resolve role extension path");
                        None
                    }
                })
                .collect();
            if !resolved.is_empty() {
                command.env("FLEET_ROLE_EXTENSIONS", resolved.join(":"));
            }
        }

        command
    }
}
