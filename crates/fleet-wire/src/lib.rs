//! IPC protocol for the control-plane socket.
//!
//! Wire format: one JSON object per request, terminated by `\n`.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod error;
mod framing;
mod request;
mod response;

pub use error::IpcError;
pub use framing::{read_line, write_response};
pub use request::{
    parse, parse_list_flags, AdvanceLifecycleMsg, ComplaintMsg, IpcMessage, LifecycleAction, ListFlags, TasksRequestMsg,
    DEFAULT_WAIT_TIMEOUT_MS, KNOWN_TASK_ACTIONS, KNOWN_TYPES, MIN_WAIT_TIMEOUT_MS, REPLACEABLE_ROLES,
};
pub use response::{coerce, err, err_summary, ok, ok_with};

#[cfg(test)]
mod property_tests;
