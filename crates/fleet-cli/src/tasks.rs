//! `fleet tasks {prune|clear}` — spec §6 CLI surface.
//!
//! Neither operation has a dedicated method on [`fleet_store::TaskStore`]:
//! the trait only ever exposes `list`/`delete` as primitives, so both
//! subcommands are built purely from those two — a `list` filtered
//! client-side followed by a point mutation, not a bespoke store call.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fleet_core::{TaskId, TaskStatus};
use fleet_store::{FileTaskStore, ListOpts, TaskStore};

fn data_path(project_path: &Path) -> PathBuf {
    std::env::var("FLEET_DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| project_path.join(".fleet").join("state.json"))
}

/// Delete every task in a terminal (`Closed`) status (spec §3: agent records
/// are "retained until explicitly pruned"; tasks follow the same posture —
/// closed is the one true terminal status, spec §3, so pruning targets it).
pub async fn prune(project_path: &Path) -> Result<usize> {
    let store = FileTaskStore::new(data_path(project_path));
    let views = store.list(&ListOpts { include_closed: true, ..Default::default() }).await.context("failed to list tasks")?;

    let mut pruned = 0;
    for view in views {
        if view.status != TaskStatus::Closed {
            continue;
        }
        let id = TaskId::new(view.id);
        store.delete(&id).await.with_context(|| format!("failed to delete task {id}"))?;
        pruned += 1;
    }
    Ok(pruned)
}

/// Delete every task regardless of status — a full reset of the store's
/// task list, for throwing away a scratch project.
pub async fn clear(project_path: &Path) -> Result<usize> {
    let store = FileTaskStore::new(data_path(project_path));
    let views = store.list(&ListOpts { include_closed: true, ..Default::default() }).await.context("failed to list tasks")?;

    let mut cleared = 0;
    for view in views {
        let id = TaskId::new(view.id);
        store.delete(&id).await.with_context(|| format!("failed to delete task {id}"))?;
        cleared += 1;
    }
    Ok(cleared)
}
