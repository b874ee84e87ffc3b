use fleet_core::{RoleId, TaskId, TaskStatus};

use super::*;

fn sample_effects(task_id: &TaskId) -> Vec<SideEffect> {
    vec![
        SideEffect::SpawnFollowUp { role: RoleId::Scout, task_id: task_id.clone(), context: None },
        SideEffect::PostComment { task_id: task_id.clone(), text: "done".to_string() },
        SideEffect::UpdateTaskStatus { task_id: task_id.clone(), status: TaskStatus::Done },
    ]
}

#[test]
fn autonomous_applies_immediately() {
    let workflow = AutonomousWorkflow;
    let task_id = TaskId::new("t1");
    let applied = workflow.submit(DispatchOutcome::new(true, sample_effects(&task_id)));
    assert_eq!(applied.len(), 3);
}

#[test]
fn interactive_queues_until_approved() {
    let workflow = InteractiveWorkflow::new();
    let task_id = TaskId::new("t1");

    let applied = workflow.submit(DispatchOutcome::new(true, sample_effects(&task_id)));
    assert!(applied.is_empty(), "interactive submit must not apply anything itself");
    assert_eq!(workflow.pending(&task_id).len(), 3);
}

/// Property 7: approval drains in comment -> status -> follow-up order.
#[test]
fn approve_drains_in_apply_order() {
    let workflow = InteractiveWorkflow::new();
    let task_id = TaskId::new("t1");
    workflow.submit(DispatchOutcome::new(true, sample_effects(&task_id)));

    let drained = workflow.approve_side_effects(&task_id);
    let ranks: Vec<u8> = drained.iter().map(SideEffect::apply_order_rank).collect();
    assert_eq!(ranks, vec![0, 1, 2]);
    assert!(workflow.pending(&task_id).is_empty());
}

#[test]
fn reject_drops_without_applying() {
    let workflow = InteractiveWorkflow::new();
    let task_id = TaskId::new("t1");
    workflow.submit(DispatchOutcome::new(true, sample_effects(&task_id)));

    workflow.reject_side_effects(&task_id);
    assert!(workflow.pending(&task_id).is_empty());
}

#[test]
fn unknown_task_operations_are_no_ops() {
    let workflow = InteractiveWorkflow::new();
    let unknown = TaskId::new("ghost");
    assert!(workflow.approve_side_effects(&unknown).is_empty());
    workflow.reject_side_effects(&unknown); // must not panic
}

#[test]
fn per_task_queues_are_independent() {
    let workflow = InteractiveWorkflow::new();
    let a = TaskId::new("a");
    let b = TaskId::new("b");
    workflow.submit(DispatchOutcome::new(true, sample_effects(&a)));
    workflow.submit(DispatchOutcome::new(true, vec![SideEffect::PostComment { task_id: b.clone(), text: "hi".to_string() }]));

    assert_eq!(workflow.pending(&a).len(), 3);
    assert_eq!(workflow.pending(&b).len(), 1);

    workflow.reject_side_effects(&a);
    assert!(workflow.pending(&a).is_empty());
    assert_eq!(workflow.pending(&b).len(), 1);
}
