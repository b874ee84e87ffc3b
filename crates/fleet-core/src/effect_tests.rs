use super::*;

#[test]
fn apply_order_rank_is_comments_then_status_then_followups() {
    let comment = SideEffect::PostComment { task_id: TaskId::new("t-1"), text: "hi".into() };
    let status = SideEffect::UpdateTaskStatus { task_id: TaskId::new("t-1"), status: TaskStatus::Blocked };
    let followup = SideEffect::SpawnFollowUp { role: RoleId::Scout, task_id: TaskId::new("t-1"), context: None };

    let mut effects = vec![followup.clone(), status.clone(), comment.clone()];
    effects.sort_by_key(|e| e.apply_order_rank());
    assert_eq!(effects, vec![comment, status, followup]);
}

#[test]
fn task_id_accessor_matches_variant_field() {
    let effect = SideEffect::PostComment { task_id: TaskId::new("t-9"), text: String::new() };
    assert_eq!(effect.task_id(), &TaskId::new("t-9"));
}
