#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleet-core: data model shared by every component of the orchestrator.

pub mod macros;

pub mod agent_record;
pub mod clock;
pub mod effect;
pub mod error;
pub mod ids;
pub mod lifecycle_signal;
pub mod role;
pub mod task;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use agent_record::{AgentEventRecord, AgentRecord, AgentRecordStatus, EventRing, Usage, UsageDelta, DEFAULT_EVENT_RING};
pub use clock::{Clock, FakeClock, SystemClock};
pub use effect::SideEffect;
pub use error::{classify_store_error, CoreError, StoreErrorKind};
pub use ids::{natural_cmp, short, AgentLocalId, IdGen, TaskId, UuidIdGen};
pub use lifecycle_signal::{AdvanceAction, AdvanceSignal, CloseSignal, LifecycleSlot, TakenSignal};
pub use role::{Capabilities, Rendering, RoleId};
pub use task::{Comment, IssueType, Task, TaskStatus};
