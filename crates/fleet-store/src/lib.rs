#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleet-store: the narrow task-store client contract (spec §6), plus a
//! file-backed reference implementation and an in-memory test double.

pub mod error;
pub mod file_store;
pub mod store;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

pub use error::StoreError;
pub use file_store::FileTaskStore;
pub use store::{StoreEvent, StoreListener, StoreResult, Subscription, TaskStore};
pub use types::{
    ActivityEntry, ActivityOpts, CompactTaskView, CreateTaskInput, DepTreeNode, DepTreeOpts, ListOpts, SearchOpts, StoredAgent,
    StoredMessage, TaskPatch,
};

#[cfg(any(test, feature = "test-support"))]
pub use memory::InMemoryTaskStore;
