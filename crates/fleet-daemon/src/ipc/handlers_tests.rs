use std::sync::Arc;

use fleet_core::{AgentLocalId, AgentRecord, FakeClock, RoleId, TaskId, TaskStatus};
use fleet_engine::{AutonomousWorkflow, LifecycleEngine};
use fleet_store::{CreateTaskInput, InMemoryTaskStore, TaskStore};
use fleet_wire::{AdvanceLifecycleMsg, ComplaintMsg, IpcMessage, LifecycleAction, TasksRequestMsg};
use serde_json::json;

use super::*;
use crate::registry::Registry;
use crate::roles::RoleConfig;
use crate::spawner::fake::FakeAgentSpawner;

async fn make_loop(max_workers: usize) -> (Arc<InMemoryTaskStore>, Arc<FakeAgentSpawner>, Arc<Registry>, AgentLoop<InMemoryTaskStore, FakeAgentSpawner>) {
    let store = Arc::new(InMemoryTaskStore::new());
    let spawner = Arc::new(FakeAgentSpawner::new());
    let registry = Arc::new(Registry::new());
    let lifecycle = Arc::new(LifecycleEngine::new());
    let roles = Arc::new(RoleConfig::builtin_only());
    let agent_loop = AgentLoop::new(store.clone(), spawner.clone(), registry.clone(), lifecycle, roles, Arc::new(AutonomousWorkflow), max_workers);
    (store, spawner, registry, agent_loop)
}

fn ok_bool(value: &serde_json::Value) -> bool {
    value.get("ok").and_then(serde_json::Value::as_bool).unwrap_or(false)
}

#[tokio::test]
async fn wake_resumes_a_paused_loop() {
    let (_store, _spawner, _registry, agent_loop) = make_loop(2).await;
    agent_loop.pause();
    let clock = FakeClock::new();

    let response = dispatch(IpcMessage::Wake, &agent_loop, &clock).await;
    assert!(ok_bool(&response));
    assert!(!agent_loop.is_paused());
}

#[tokio::test]
async fn tasks_request_create_then_show_round_trips() {
    let (_store, _spawner, _registry, agent_loop) = make_loop(2).await;
    let clock = FakeClock::new();

    let create = dispatch(
        IpcMessage::TasksRequest(TasksRequestMsg { action: "create".into(), params: json!({ "title": "fix bug" }), default_task_id: None }),
        &agent_loop,
        &clock,
    )
    .await;
    assert!(ok_bool(&create));
    let id = create["task"]["id"].as_str().expect("task id").to_string();

    let show = dispatch(
        IpcMessage::TasksRequest(TasksRequestMsg { action: "show".into(), params: json!({ "id": id }), default_task_id: None }),
        &agent_loop,
        &clock,
    )
    .await;
    assert!(ok_bool(&show));
    assert_eq!(show["task"]["title"], "fix bug");
}

#[tokio::test]
async fn tasks_request_close_clears_lifecycle_state() {
    let (store, _spawner, _registry, agent_loop) = make_loop(2).await;
    let task = store.create(CreateTaskInput { title: "a".into(), ..Default::default() }).await.expect("create ok");
    agent_loop.lifecycle().post_advance(
        &task.id,
        fleet_core::AdvanceSignal { action: fleet_core::AdvanceAction::Worker, message: None, reason: None, agent_id: AgentLocalId::new("v1"), ts_ms: 1 },
    );
    assert!(agent_loop.lifecycle().has_pending(&task.id));
    let clock = FakeClock::new();

    let response = dispatch(
        IpcMessage::TasksRequest(TasksRequestMsg { action: "close".into(), params: json!({ "id": task.id.as_str() }), default_task_id: None }),
        &agent_loop,
        &clock,
    )
    .await;
    assert!(ok_bool(&response));
    assert!(!agent_loop.lifecycle().has_pending(&task.id));
}

#[tokio::test]
async fn tasks_request_unknown_action_is_rejected() {
    let (_store, _spawner, _registry, agent_loop) = make_loop(2).await;
    let clock = FakeClock::new();

    let response = dispatch(
        IpcMessage::TasksRequest(TasksRequestMsg { action: "nonsense".into(), params: json!({}), default_task_id: None }),
        &agent_loop,
        &clock,
    )
    .await;
    assert!(!ok_bool(&response));
}

#[tokio::test]
async fn advance_lifecycle_close_posts_a_close_signal() {
    let (store, _spawner, _registry, agent_loop) = make_loop(2).await;
    let task = store.create(CreateTaskInput { title: "a".into(), ..Default::default() }).await.expect("create ok");
    let clock = FakeClock::new();

    let response = dispatch(
        IpcMessage::AdvanceLifecycle(AdvanceLifecycleMsg {
            agent_type: "verifier".into(),
            task_id: task.id.to_string(),
            action: LifecycleAction::Close,
            target: None,
            message: None,
            reason: Some("looks good".into()),
            agent_id: None,
        }),
        &agent_loop,
        &clock,
    )
    .await;

    assert!(ok_bool(&response));
    assert!(agent_loop.lifecycle().has_pending(&task.id));
}

#[tokio::test]
async fn advance_lifecycle_rejects_a_role_without_the_capability() {
    let (store, _spawner, _registry, agent_loop) = make_loop(2).await;
    let task = store.create(CreateTaskInput { title: "a".into(), ..Default::default() }).await.expect("create ok");
    let clock = FakeClock::new();

    let response = dispatch(
        IpcMessage::AdvanceLifecycle(AdvanceLifecycleMsg {
            agent_type: "implementer".into(),
            task_id: task.id.to_string(),
            action: LifecycleAction::Close,
            target: None,
            message: None,
            reason: None,
            agent_id: None,
        }),
        &agent_loop,
        &clock,
    )
    .await;

    assert!(!ok_bool(&response));
    assert!(!agent_loop.lifecycle().has_pending(&task.id));
}

#[tokio::test]
async fn advance_lifecycle_rejects_a_task_that_does_not_exist() {
    let (_store, _spawner, _registry, agent_loop) = make_loop(2).await;
    let clock = FakeClock::new();

    let response = dispatch(
        IpcMessage::AdvanceLifecycle(AdvanceLifecycleMsg {
            agent_type: "verifier".into(),
            task_id: "t-missing".into(),
            action: LifecycleAction::Close,
            target: None,
            message: None,
            reason: None,
            agent_id: None,
        }),
        &agent_loop,
        &clock,
    )
    .await;

    assert!(!ok_bool(&response));
}

#[tokio::test]
async fn advance_lifecycle_enforces_the_task_boundary() {
    let (store, _spawner, registry, agent_loop) = make_loop(2).await;
    let task = store.create(CreateTaskInput { title: "a".into(), ..Default::default() }).await.expect("create ok");
    let other = store.create(CreateTaskInput { title: "b".into(), ..Default::default() }).await.expect("create ok");
    registry.register(AgentRecord::new(AgentLocalId::new("verifier-1"), RoleId::Verifier, Some(task.id.clone()), 0, 16));
    let clock = FakeClock::new();

    let response = dispatch(
        IpcMessage::AdvanceLifecycle(AdvanceLifecycleMsg {
            agent_type: "verifier".into(),
            task_id: other.id.to_string(),
            action: LifecycleAction::Close,
            target: None,
            message: None,
            reason: None,
            agent_id: Some("verifier-1".into()),
        }),
        &agent_loop,
        &clock,
    )
    .await;

    assert!(!ok_bool(&response));
    assert!(!agent_loop.lifecycle().has_pending(&other.id));
}

#[tokio::test]
async fn advance_lifecycle_block_defers_with_no_target() {
    let (store, _spawner, _registry, agent_loop) = make_loop(2).await;
    let task = store.create(CreateTaskInput { title: "a".into(), ..Default::default() }).await.expect("create ok");
    let clock = FakeClock::new();

    let response = dispatch(
        IpcMessage::AdvanceLifecycle(AdvanceLifecycleMsg {
            agent_type: "verifier".into(),
            task_id: task.id.to_string(),
            action: LifecycleAction::Block,
            target: None,
            message: Some("needs more tests".into()),
            reason: None,
            agent_id: None,
        }),
        &agent_loop,
        &clock,
    )
    .await;

    assert!(ok_bool(&response));
    let decision = agent_loop.lifecycle().on_verifier_exit(task.id.clone(), || unreachable!("pending signal present"));
    assert!(matches!(decision, fleet_engine::LifecycleDecision::Defer { .. }));
}

#[tokio::test]
async fn advance_lifecycle_advance_requires_a_known_target() {
    let (store, _spawner, _registry, agent_loop) = make_loop(2).await;
    let task = store.create(CreateTaskInput { title: "a".into(), ..Default::default() }).await.expect("create ok");
    let clock = FakeClock::new();

    let response = dispatch(
        IpcMessage::AdvanceLifecycle(AdvanceLifecycleMsg {
            agent_type: "verifier".into(),
            task_id: task.id.to_string(),
            action: LifecycleAction::Advance,
            target: Some("supervisor".into()),
            message: None,
            reason: None,
            agent_id: None,
        }),
        &agent_loop,
        &clock,
    )
    .await;

    assert!(!ok_bool(&response));
    assert!(!agent_loop.lifecycle().has_pending(&task.id));
}

#[tokio::test]
async fn replace_agent_blocked_task_unblocks_and_spawns() {
    let (store, spawner, registry, agent_loop) = make_loop(2).await;
    let task = store.create(CreateTaskInput { title: "a".into(), ..Default::default() }).await.expect("create ok");
    store.update_status(&task.id, TaskStatus::Blocked).await.expect("update ok");
    registry.register(AgentRecord::new(AgentLocalId::new("w1"), RoleId::Implementer, Some(task.id.clone()), 0, 16));
    let clock = FakeClock::new();

    let response = dispatch(
        IpcMessage::ReplaceAgent { role: "scout".into(), task_id: task.id.to_string(), context: Some("go look".into()) },
        &agent_loop,
        &clock,
    )
    .await;

    assert!(ok_bool(&response));
    let reloaded = store.show(&task.id).await.expect("show ok");
    assert_eq!(reloaded.status, TaskStatus::InProgress);
    assert!(spawner.calls().iter().any(|c| matches!(c, crate::spawner::fake::SpawnerCall::Spawn { role: RoleId::Scout, .. })));
}

#[tokio::test]
async fn replace_agent_rejects_a_missing_task() {
    let (_store, _spawner, _registry, agent_loop) = make_loop(2).await;
    let clock = FakeClock::new();

    let response = dispatch(IpcMessage::ReplaceAgent { role: "scout".into(), task_id: "t-missing".into(), context: None }, &agent_loop, &clock).await;
    assert!(!ok_bool(&response));
}

#[tokio::test]
async fn steer_agent_rejects_a_missing_task_without_touching_the_loop() {
    let (_store, spawner, _registry, agent_loop) = make_loop(2).await;
    let clock = FakeClock::new();

    let response = dispatch(IpcMessage::SteerAgent { task_id: "t-missing".into(), message: "hurry".into() }, &agent_loop, &clock).await;
    assert_eq!(response, json!({ "ok": false, "error": "steer_agent: task t-missing does not exist" }));
    assert!(spawner.calls().is_empty());
}

#[tokio::test]
async fn stop_agents_for_task_without_wait_returns_immediately() {
    let (store, _spawner, registry, agent_loop) = make_loop(2).await;
    let task = store.create(CreateTaskInput { title: "a".into(), ..Default::default() }).await.expect("create ok");
    registry.register(AgentRecord::new(AgentLocalId::new("w1"), RoleId::Implementer, Some(task.id.clone()), 0, 16));
    registry.register(AgentRecord::new(AgentLocalId::new("v1"), RoleId::Verifier, Some(task.id.clone()), 0, 16));
    let clock = FakeClock::new();

    let response = dispatch(
        IpcMessage::StopAgentsForTask { task_id: task.id.to_string(), include_verifier: false, wait_for_completion: false },
        &agent_loop,
        &clock,
    )
    .await;

    assert!(ok_bool(&response));
    assert_eq!(response["stopped"], 1);
}

#[tokio::test]
async fn stop_agents_for_task_with_wait_blocks_until_registry_reflects_the_stop() {
    let (store, _spawner, registry, agent_loop) = make_loop(2).await;
    let task = store.create(CreateTaskInput { title: "a".into(), ..Default::default() }).await.expect("create ok");
    registry.register(AgentRecord::new(AgentLocalId::new("w1"), RoleId::Implementer, Some(task.id.clone()), 0, 16));
    let clock = FakeClock::new();

    let response = dispatch(
        IpcMessage::StopAgentsForTask { task_id: task.id.to_string(), include_verifier: false, wait_for_completion: true },
        &agent_loop,
        &clock,
    )
    .await;

    assert!(ok_bool(&response));
    assert_eq!(response["stopped"], 1);
    assert!(registry.get_active_by_task(&task.id).is_empty());
}

#[tokio::test]
async fn complain_and_revoke_round_trip_through_dispatch() {
    let (_store, _spawner, _registry, agent_loop) = make_loop(2).await;
    let clock = FakeClock::new();

    let complain = dispatch(
        IpcMessage::Complain(ComplaintMsg { files: vec!["a.rs".into()], reason: "needs tests".into(), complainant: "verifier-1".into() }),
        &agent_loop,
        &clock,
    )
    .await;
    assert!(ok_bool(&complain));
    assert_eq!(agent_loop.complaints().outstanding().len(), 1);

    let revoke = dispatch(
        IpcMessage::RevokeComplaint(ComplaintMsg { files: vec!["a.rs".into()], reason: String::new(), complainant: "verifier-1".into() }),
        &agent_loop,
        &clock,
    )
    .await;
    assert!(ok_bool(&revoke));
    assert!(agent_loop.complaints().outstanding().is_empty());
}

#[tokio::test]
async fn wait_for_agent_reports_not_found_for_an_unknown_id() {
    let (_store, _spawner, _registry, agent_loop) = make_loop(2).await;
    let clock = FakeClock::new();

    let response = dispatch(IpcMessage::WaitForAgent { agent_id: "ghost".into(), timeout_ms: 1_000 }, &agent_loop, &clock).await;
    assert_eq!(response, json!({ "ok": true, "status": "not_found" }));
}

#[tokio::test]
async fn wait_for_agent_reports_a_terminal_status_immediately() {
    let (_store, _spawner, registry, agent_loop) = make_loop(2).await;
    let mut record = AgentRecord::new(AgentLocalId::new("w1"), RoleId::Implementer, None, 0, 16);
    record.status = fleet_core::AgentRecordStatus::Done;
    registry.register(record);
    let clock = FakeClock::new();

    let response = dispatch(IpcMessage::WaitForAgent { agent_id: "w1".into(), timeout_ms: 1_000 }, &agent_loop, &clock).await;
    assert_eq!(response, json!({ "ok": true, "status": "done" }));
}

#[tokio::test]
async fn wait_for_agent_times_out_on_a_still_running_agent() {
    let (_store, _spawner, registry, agent_loop) = make_loop(2).await;
    registry.register(AgentRecord::new(AgentLocalId::new("w1"), RoleId::Implementer, None, 0, 16));
    let clock = FakeClock::new();

    let response = dispatch(IpcMessage::WaitForAgent { agent_id: "w1".into(), timeout_ms: 1 }, &agent_loop, &clock).await;
    assert_eq!(response, json!({ "ok": false, "timeout": true }));
}

#[tokio::test]
async fn list_active_agents_reports_only_non_terminal_records() {
    let (_store, _spawner, registry, agent_loop) = make_loop(2).await;
    registry.register(AgentRecord::new(AgentLocalId::new("w1"), RoleId::Implementer, None, 0, 16));
    let mut done = AgentRecord::new(AgentLocalId::new("w2"), RoleId::Implementer, None, 0, 16);
    done.status = fleet_core::AgentRecordStatus::Done;
    registry.register(done);
    let clock = FakeClock::new();

    let response = dispatch(IpcMessage::ListActiveAgents, &agent_loop, &clock).await;
    assert!(ok_bool(&response));
    assert_eq!(response["agents"].as_array().expect("agents array").len(), 1);
}

#[tokio::test]
async fn list_task_agents_merges_live_and_persisted_without_duplicates() {
    let (store, _spawner, registry, agent_loop) = make_loop(2).await;
    let task = store.create(CreateTaskInput { title: "a".into(), ..Default::default() }).await.expect("create ok");

    let duplicate = store.create_agent("w1").await.expect("create_agent ok");
    store.set_slot(&task.id, &duplicate.id).await.expect("set_slot ok");
    let mut record = AgentRecord::new(AgentLocalId::new("w1"), RoleId::Implementer, Some(task.id.clone()), 0, 16);
    record.tasks_agent_id = Some(duplicate.id.clone());
    registry.register(record);

    let persisted_only = store.create_agent("w2").await.expect("create_agent ok");
    store.set_slot(&task.id, &persisted_only.id).await.expect("set_slot ok");
    store.set_agent_state(&persisted_only.id, "done").await.expect("set_agent_state ok");
    let clock = FakeClock::new();

    let response = dispatch(IpcMessage::ListTaskAgents { task_id: task.id.to_string() }, &agent_loop, &clock).await;
    assert!(ok_bool(&response));
    let agents = response["agents"].as_array().expect("agents array");
    assert_eq!(agents.len(), 2);
    assert!(agents.iter().any(|a| a["source"] == "live"));
    assert!(agents.iter().any(|a| a["source"] == "persisted" && a["id"] == persisted_only.id.as_str()));
}

#[tokio::test]
async fn read_message_history_prefers_the_live_agent_over_the_store() {
    let (_store, _spawner, registry, agent_loop) = make_loop(2).await;
    let id = AgentLocalId::new("w1");
    let mut record = AgentRecord::new(id.clone(), RoleId::Implementer, Some(TaskId::new("t1")), 0, 16);
    record.events.push(json!({
        "role": "assistant",
        "content": [{"type": "tool_use", "id": "call-1", "name": "read_file"}],
    }));
    registry.register(record);
    let clock = FakeClock::new();

    let response = dispatch(IpcMessage::ReadMessageHistory { agent_id: "w1".into(), task_id: Some("t1".into()), limit: None }, &agent_loop, &clock).await;
    assert!(ok_bool(&response));
    assert_eq!(response["messages"].as_array().expect("messages array").len(), 1);
    assert_eq!(response["toolCalls"].as_array().expect("tool calls array").len(), 1);
}

#[tokio::test]
async fn read_message_history_falls_back_to_the_store_for_an_unknown_live_agent() {
    let (_store, _spawner, _registry, agent_loop) = make_loop(2).await;
    let clock = FakeClock::new();

    let response = dispatch(IpcMessage::ReadMessageHistory { agent_id: "persisted-agent".into(), task_id: None, limit: None }, &agent_loop, &clock).await;
    assert!(ok_bool(&response));
    assert!(response["agent"].is_null());
    assert!(response["messages"].as_array().expect("messages array").is_empty());
}
