//! Control-socket path derivation — spec §6 "a local stream socket whose
//! path is derived deterministically from the target project path".
//!
//! A state directory resolved from environment, joined with a short id so
//! the resulting path stays under the ~104-byte `sockaddr_un` budget on
//! Linux/macOS even for deeply nested project paths.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Conservative ceiling below the platform `sockaddr_un` limit (108 on
/// Linux, 104 on macOS), leaving room for the null terminator.
pub const MAX_SOCKET_PATH_LEN: usize = 100;

/// Hash the canonicalized project path into a short, filesystem-safe id.
fn short_project_id(project_path: &Path) -> String {
    let canonical = project_path.canonicalize().unwrap_or_else(|_| project_path.to_path_buf());
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// Pure function of the project path: `$FLEET_STATE_DIR/sock/<hash>.sock`,
/// falling back to `$XDG_STATE_HOME/fleet` then `~/.local/state/fleet`
/// when `FLEET_STATE_DIR` isn't set.
pub fn socket_path(project_path: &Path) -> PathBuf {
    let state_dir = resolve_state_dir();
    let id = short_project_id(project_path);
    state_dir.join("sock").join(format!("{id}.sock"))
}

fn resolve_state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FLEET_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("fleet");
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".local/state/fleet")
}
