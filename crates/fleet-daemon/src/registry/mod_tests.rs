use fleet_core::{AgentLocalId, AgentRecord, AgentRecordStatus, RoleId, TaskId};

use super::*;

fn record(id: &str, role: RoleId, task: &str) -> AgentRecord {
    AgentRecord::new(AgentLocalId::new(id), role, Some(TaskId::new(task)), 0, 4)
}

#[test]
fn register_twice_replaces_prior_record_and_reindexes() {
    let registry = Registry::new();
    let mut first = record("agent-1", RoleId::Implementer, "t1");
    first.tasks_agent_id = Some("tasks-agent-a".to_string());
    registry.register(first);

    let mut second = record("agent-1", RoleId::Verifier, "t1");
    second.tasks_agent_id = Some("tasks-agent-b".to_string());
    registry.register(second);

    let resolved = registry.get(&AgentLocalId::new("agent-1")).expect("record present");
    assert_eq!(resolved.role, RoleId::Verifier);
    assert!(registry.get_by_tasks_agent_id("tasks-agent-a").is_none());
    assert!(registry.get_by_tasks_agent_id("tasks-agent-b").is_some());
}

#[test]
fn push_event_evicts_oldest_beyond_capacity() {
    let registry = Registry::new();
    let id = AgentLocalId::new("agent-1");
    registry.register(record("agent-1", RoleId::Implementer, "t1"));

    for i in 0..6 {
        registry.push_event(&id, serde_json::json!({"i": i})).expect("push ok");
    }

    let events = registry.get(&id).expect("present").events;
    assert_eq!(events.len(), 4);
    let first_payload = events.iter().next().expect("has head").payload.clone();
    assert_eq!(first_payload, serde_json::json!({"i": 2}));
}

#[test]
fn get_active_by_task_excludes_terminal_statuses() {
    let registry = Registry::new();
    registry.register(record("agent-1", RoleId::Implementer, "t1"));
    registry.register(record("agent-2", RoleId::Verifier, "t1"));
    registry.set_status(&AgentLocalId::new("agent-2"), AgentRecordStatus::Done).expect("set ok");

    let active = registry.get_active_by_task(&TaskId::new("t1"));
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, AgentLocalId::new("agent-1"));
}

#[test]
fn check_task_boundary_detects_mismatch() {
    let registry = Registry::new();
    registry.register(record("agent-1", RoleId::Implementer, "t1"));

    assert!(registry.check_task_boundary(&AgentLocalId::new("agent-1"), Some(&TaskId::new("t1"))).is_ok());
    assert!(matches!(
        registry.check_task_boundary(&AgentLocalId::new("agent-1"), Some(&TaskId::new("t2"))),
        Err(RegistryError::TaskMismatch { .. })
    ));
    assert!(registry.check_task_boundary(&AgentLocalId::new("agent-1"), None).is_ok());
}

#[test]
fn prune_terminal_before_removes_only_old_terminal_records() {
    let registry = Registry::new();
    registry.register(record("agent-1", RoleId::Implementer, "t1"));
    registry.register(record("agent-2", RoleId::Implementer, "t2"));
    registry.set_status(&AgentLocalId::new("agent-1"), AgentRecordStatus::Done).expect("set ok");
    registry.touch_last_activity(&AgentLocalId::new("agent-1"), 100).expect("touch ok");

    let pruned = registry.prune_terminal_before(200);
    assert_eq!(pruned, 1);
    assert!(registry.get(&AgentLocalId::new("agent-1")).is_none());
    assert!(registry.get(&AgentLocalId::new("agent-2")).is_some());
}

#[test]
fn is_worker_kind_covers_scout_and_implementer_only() {
    assert!(is_worker_kind(&RoleId::Implementer));
    assert!(is_worker_kind(&RoleId::Scout));
    assert!(!is_worker_kind(&RoleId::Verifier));
    assert!(!is_worker_kind(&RoleId::Orchestrator));
}
