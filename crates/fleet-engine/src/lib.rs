//! Scheduling and decision logic for fleet: the Conflict Checker, Scheduler,
//! Lifecycle Engine, and Workflow Engine (spec §4.A, §4.B, §4.E, §4.F).
//!
//! Deliberately has no knowledge of subprocesses, IPC, or the Agent
//! Registry — `fleet-daemon` owns those and consumes the decisions this
//! crate produces, so this crate only ever depends on `fleet-core` and
//! `fleet-store`.

pub mod conflict;
pub mod lifecycle;
pub mod scheduler;
pub mod workflow;

pub use conflict::{check_label_conflicts, ConflictResult, InProgressLabels};
pub use lifecycle::{is_replaceable, plan_replace, LifecycleDecision, LifecycleEngine, RecoveryContext, ReplaceError, ReplacePlan};
pub use scheduler::{ActiveAgents, NoActiveAgents, Scheduler, SchedulerError, SchedulerResult};
pub use workflow::{
    resolve_auto_process_ready_tasks, AutoProcessSource, AutonomousWorkflow, DispatchOutcome, InteractiveWorkflow,
    WorkflowEngine,
};
