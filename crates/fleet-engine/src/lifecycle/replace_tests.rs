use fleet_core::{RoleId, TaskId, TaskStatus};

use super::*;

#[test]
fn rejects_when_loop_paused() {
    let err = plan_replace(true, TaskId::new("t1"), Some(TaskStatus::Open), RoleId::Verifier, None).unwrap_err();
    assert_eq!(err, ReplaceError::LoopPaused);
}

#[test]
fn rejects_missing_task() {
    let err = plan_replace(false, TaskId::new("t1"), None, RoleId::Verifier, None).unwrap_err();
    assert_eq!(err, ReplaceError::TaskNotFound(TaskId::new("t1")));
}

#[test]
fn rejects_closed_task() {
    let err = plan_replace(false, TaskId::new("t1"), Some(TaskStatus::Closed), RoleId::Verifier, None).unwrap_err();
    assert_eq!(err, ReplaceError::TaskClosed(TaskId::new("t1")));
}

#[test]
fn rejects_non_replaceable_role() {
    let err = plan_replace(false, TaskId::new("t1"), Some(TaskStatus::Open), RoleId::Orchestrator, None).unwrap_err();
    assert_eq!(err, ReplaceError::RoleNotReplaceable(RoleId::Orchestrator));
}

/// S5: replace on a blocked task unblocks it first.
#[test]
fn blocked_task_is_flagged_for_unblock() {
    let plan = plan_replace(
        false,
        TaskId::new("t1"),
        Some(TaskStatus::Blocked),
        RoleId::Implementer,
        Some("resume here".to_string()),
    )
    .unwrap();
    assert!(plan.unblock_first);
    assert_eq!(plan.context.as_deref(), Some("resume here"));
}

#[test]
fn in_progress_task_does_not_need_unblock() {
    let plan = plan_replace(false, TaskId::new("t1"), Some(TaskStatus::InProgress), RoleId::Scout, None).unwrap();
    assert!(!plan.unblock_first);
}
