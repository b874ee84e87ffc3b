use fleet_core::{AdvanceAction, AdvanceSignal, AgentLocalId, CloseSignal, TaskId};

use super::*;

fn agent(id: &str) -> AgentLocalId {
    AgentLocalId::new(id)
}

#[test]
fn worker_exit_always_spawns_verifier() {
    let engine = LifecycleEngine::new();
    let decision = engine.on_worker_exit(TaskId::new("t1"), Some("here's what I did".to_string()));
    assert_eq!(
        decision,
        LifecycleDecision::SpawnVerifier { task_id: TaskId::new("t1"), context: Some("here's what I did".to_string()) }
    );
}

/// Property 5: verifier exits with no signal posted -> sticky retry.
#[test]
fn verifier_exit_with_no_signal_respawns_with_recovery() {
    let engine = LifecycleEngine::new();
    let decision = engine.on_verifier_exit(TaskId::new("t1"), || {
        RecoveryContext::build(Some("sess-1".to_string()), "task is open".to_string(), &[])
    });
    match decision {
        LifecycleDecision::RespawnVerifier { task_id, recovery } => {
            assert_eq!(task_id, TaskId::new("t1"));
            assert_eq!(recovery.previous_session_id.as_deref(), Some("sess-1"));
        }
        other => panic!("expected RespawnVerifier, got {other:?}"),
    }
}

/// Property 6: close wins on equal timestamp.
#[test]
fn close_wins_tie_with_advance() {
    let engine = LifecycleEngine::new();
    let task_id = TaskId::new("t1");
    engine.post_advance(
        &task_id,
        AdvanceSignal { action: AdvanceAction::Worker, message: None, reason: None, agent_id: agent("a1"), ts_ms: 1000 },
    );
    engine.post_close(&task_id, CloseSignal { reason: Some("done".to_string()), agent_id: agent("a1"), ts_ms: 1000 });

    let decision = engine.on_verifier_exit(task_id.clone(), || RecoveryContext::default());
    assert_eq!(decision, LifecycleDecision::Close { task_id, reason: Some("done".to_string()) });
}

/// S4: verifier posts `advance=defer` with a reason and message.
#[test]
fn defer_signal_formats_block_comment() {
    let engine = LifecycleEngine::new();
    let task_id = TaskId::new("t1");
    engine.post_advance(
        &task_id,
        AdvanceSignal {
            action: AdvanceAction::Defer,
            message: Some("waiting on upstream API".to_string()),
            reason: Some("needs design sign-off".to_string()),
            agent_id: agent("a1"),
            ts_ms: 5,
        },
    );

    let decision = engine.on_verifier_exit(task_id.clone(), || RecoveryContext::default());
    match decision {
        LifecycleDecision::Defer { task_id: t, comment } => {
            assert_eq!(t, task_id);
            assert_eq!(comment, "Blocked by verifier advance_lifecycle. needs design sign-off\nmessage: waiting on upstream API");
        }
        other => panic!("expected Defer, got {other:?}"),
    }
}

#[test]
fn advance_worker_and_scout_route_to_matching_decisions() {
    let engine = LifecycleEngine::new();
    let worker_task = TaskId::new("t-worker");
    engine.post_advance(
        &worker_task,
        AdvanceSignal { action: AdvanceAction::Worker, message: Some("go".to_string()), reason: None, agent_id: agent("a1"), ts_ms: 1 },
    );
    assert_eq!(
        engine.on_verifier_exit(worker_task.clone(), || RecoveryContext::default()),
        LifecycleDecision::SpawnWorker { task_id: worker_task, context: Some("go".to_string()) }
    );

    let scout_task = TaskId::new("t-scout");
    engine.post_advance(
        &scout_task,
        AdvanceSignal { action: AdvanceAction::Scout, message: None, reason: None, agent_id: agent("a1"), ts_ms: 1 },
    );
    assert_eq!(
        engine.on_verifier_exit(scout_task.clone(), || RecoveryContext::default()),
        LifecycleDecision::SpawnScout { task_id: scout_task, context: None }
    );
}

#[test]
fn external_close_clears_pending_signal() {
    let engine = LifecycleEngine::new();
    let task_id = TaskId::new("t1");
    engine.post_advance(
        &task_id,
        AdvanceSignal { action: AdvanceAction::Worker, message: None, reason: None, agent_id: agent("a1"), ts_ms: 1 },
    );
    assert!(engine.has_pending(&task_id));

    engine.handle_external_task_close(&task_id);
    assert!(!engine.has_pending(&task_id));

    // No stale sticky-retry leakage: a verifier exit after an external close
    // sees an empty slot and falls through to the default respawn case.
    let decision = engine.on_verifier_exit(task_id.clone(), || RecoveryContext::default());
    assert_eq!(decision, LifecycleDecision::RespawnVerifier { task_id, recovery: RecoveryContext::default() });
}
