//! IPC dispatch table — spec §4.G.
//!
//! Maps each validated [`IpcMessage`] onto [`AgentLoop`]/[`Registry`]/
//! [`LifecycleEngine`]/[`TaskStore`] calls and builds the wire response.
//! `fleet_wire::parse` already did envelope-level validation; everything
//! here is a runtime check that needs store/registry state in hand (task
//! existence, role capability, task-boundary).

use std::time::Duration;

use fleet_core::{AdvanceAction, AdvanceSignal, AgentLocalId, Clock, CloseSignal, RoleId, TaskId};
use fleet_engine::plan_replace;
use fleet_store::{ActivityOpts, CreateTaskInput, DepTreeOpts, ListOpts, SearchOpts, TaskPatch, TaskStore};
use fleet_wire::{err, ok, ok_with, AdvanceLifecycleMsg, ComplaintMsg, IpcMessage, LifecycleAction, TasksRequestMsg};
use serde_json::{json, Value};
use tracing::warn;

use crate::ipc::audit::{record_mutation, truncate_close_reason, SYSTEM_AGENT_ID};
use crate::loop_::AgentLoop;
use crate::registry::{pair_tool_calls, Registry};
use crate::spawner::AgentSpawner;

/// Polling cadence for `wait_for_agent` (spec §5).
const WAIT_POLL_INTERVAL_MS: u64 = 50;
/// Upper bound on how long `stop_agents_for_task` will wait when
/// `waitForCompletion` is set, so a stuck subprocess can't wedge the socket
/// forever (spec §5 "IPC responses are best-effort").
const STOP_WAIT_BUDGET_MS: u64 = 10_000;

/// Dispatch one parsed control-plane message. `clock` supplies the
/// timestamp stamped onto lifecycle signals.
pub async fn dispatch<S: TaskStore, P: AgentSpawner, C: Clock>(msg: IpcMessage, agent_loop: &AgentLoop<S, P>, clock: &C) -> Value {
    match msg {
        IpcMessage::Wake => {
            agent_loop.wake();
            ok()
        }

        IpcMessage::StartTasks { count } => match agent_loop.start_tasks(count as usize).await {
            Ok(ids) => ok_with(json!({ "started": ids.iter().map(|id| id.to_string()).collect::<Vec<_>>() })),
            Err(e) => err(e.to_string()),
        },

        IpcMessage::TasksRequest(request) => dispatch_tasks_request(request, agent_loop).await,

        IpcMessage::AdvanceLifecycle(request) => dispatch_advance_lifecycle(request, agent_loop, clock).await,

        IpcMessage::Broadcast { message } => match agent_loop.broadcast_to_workers(&message).await {
            Ok(sent) => ok_with(json!({ "sent": sent })),
            Err(e) => err(e.to_string()),
        },

        IpcMessage::InterruptAgent { task_id, message } => {
            let task_id = TaskId::new(task_id);
            if agent_loop.store().show(&task_id).await.is_err() {
                return err(format!("interrupt_agent: task {task_id} does not exist"));
            }
            let count = agent_loop.interrupt_agent(&task_id, &message);
            ok_with(json!({ "interrupted": count }))
        }

        IpcMessage::SteerAgent { task_id, message } => {
            let task_id = TaskId::new(task_id);
            if agent_loop.store().show(&task_id).await.is_err() {
                return err(format!("steer_agent: task {task_id} does not exist"));
            }
            match agent_loop.steer_agent(&task_id, &message) {
                Ok(count) => ok_with(json!({ "steered": count })),
                Err(e) => err(e.to_string()),
            }
        }

        IpcMessage::ReplaceAgent { role, task_id, context } => dispatch_replace_agent(role, task_id, context, agent_loop).await,

        IpcMessage::StopAgentsForTask { task_id, include_verifier, wait_for_completion } => {
            dispatch_stop_agents_for_task(TaskId::new(task_id), include_verifier, wait_for_completion, agent_loop).await
        }

        IpcMessage::Complain(ComplaintMsg { files, reason, complainant }) => {
            agent_loop.complain(files, reason, complainant);
            ok()
        }

        IpcMessage::RevokeComplaint(ComplaintMsg { files, complainant, .. }) => {
            agent_loop.revoke_complaint(&files, &complainant);
            ok()
        }

        IpcMessage::WaitForAgent { agent_id, timeout_ms } => dispatch_wait_for_agent(&agent_id, timeout_ms, agent_loop.registry()).await,

        IpcMessage::ListActiveAgents => {
            let summaries = agent_loop.registry().list_active_summaries();
            ok_with(json!({ "agents": summaries }))
        }

        IpcMessage::ListTaskAgents { task_id } => dispatch_list_task_agents(TaskId::new(task_id), agent_loop).await,

        IpcMessage::ReadMessageHistory { agent_id, task_id, limit } => {
            dispatch_read_message_history(&agent_id, task_id.as_deref(), limit, agent_loop).await
        }

        IpcMessage::PendingSideEffects { task_id } => {
            let effects = agent_loop.pending_side_effects(&TaskId::new(task_id));
            ok_with(json!({ "effects": effects }))
        }

        IpcMessage::ApproveSideEffects { task_id } => match agent_loop.approve_side_effects(&TaskId::new(task_id)).await {
            Ok(applied) => ok_with(json!({ "applied": applied })),
            Err(e) => err(e.to_string()),
        },

        IpcMessage::RejectSideEffects { task_id } => {
            agent_loop.reject_side_effects(&TaskId::new(task_id));
            ok()
        }
    }
}

async fn dispatch_tasks_request<S: TaskStore, P: AgentSpawner>(request: TasksRequestMsg, agent_loop: &AgentLoop<S, P>) -> Value {
    let TasksRequestMsg { action, params, default_task_id } = request;
    let store = agent_loop.store();

    let resolve_id = |field: &str| -> Option<TaskId> {
        params.get(field).and_then(Value::as_str).map(str::to_string).or_else(|| default_task_id.clone()).map(TaskId::new)
    };
    let str_field = |field: &str| params.get(field).and_then(Value::as_str).map(str::to_string);
    let string_vec = |field: &str| -> Vec<String> {
        params.get(field).and_then(Value::as_array).map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect()).unwrap_or_default()
    };

    match action.as_str() {
        "ready" => match store.ready().await {
            Ok(tasks) => ok_with(json!({ "tasks": tasks })),
            Err(e) => err(e.to_string()),
        },

        "list" => {
            let opts = ListOpts {
                include_closed: params.get("includeClosed").and_then(Value::as_bool).unwrap_or(false),
                status: str_field("status").and_then(|s| parse_task_status(&s)),
                issue_type: str_field("type"),
                limit: params.get("limit").and_then(Value::as_u64).map(|n| n as usize),
            };
            match store.list(&opts).await {
                Ok(views) => ok_with(json!({ "tasks": views })),
                Err(e) => err(e.to_string()),
            }
        }

        "show" => {
            let Some(id) = resolve_id("id") else { return err("id required for show") };
            match store.show(&id).await {
                Ok(task) => ok_with(json!({ "task": task })),
                Err(e) => err(e.to_string()),
            }
        }

        "create" => {
            let input = CreateTaskInput {
                title: str_field("title").unwrap_or_default(),
                description: str_field("description"),
                priority: params.get("priority").and_then(Value::as_i64),
                labels: string_vec("labels"),
                depends_on_ids: string_vec("dependsOnIds"),
                issue_type: str_field("type"),
            };
            match store.create(input).await {
                Ok(task) => {
                    record_mutation(agent_loop.registry(), "create", str_field("actor").as_deref(), task.id.as_str(), json!({ "title": task.title }));
                    ok_with(json!({ "task": task }))
                }
                Err(e) => err(e.to_string()),
            }
        }

        "update" => {
            let Some(id) = resolve_id("id") else { return err("id required for update") };
            let patch = TaskPatch {
                title: str_field("title"),
                description: str_field("description"),
                status: str_field("status").and_then(|s| parse_task_status(&s)),
                priority: params.get("priority").and_then(Value::as_i64),
                assignee: str_field("assignee"),
                labels: params.get("labels").and_then(Value::as_array).map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect()),
                depends_on_ids: params
                    .get("dependsOnIds")
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect()),
            };
            let fields = json!({ "status": patch.status, "assignee": patch.assignee });
            match store.update(&id, patch).await {
                Ok(task) => {
                    record_mutation(agent_loop.registry(), "update", str_field("actor").as_deref(), id.as_str(), fields);
                    ok_with(json!({ "task": task }))
                }
                Err(e) => err(e.to_string()),
            }
        }

        "close" => {
            let Some(id) = resolve_id("id") else { return err("id required for close") };
            let reason = str_field("reason").map(|r| truncate_close_reason(&r));
            match store.close(&id, reason.as_deref()).await {
                Ok(task) => {
                    agent_loop.lifecycle().handle_external_task_close(&id);
                    record_mutation(agent_loop.registry(), "close", str_field("actor").as_deref(), id.as_str(), json!({ "reason": reason }));
                    ok_with(json!({ "task": task }))
                }
                Err(e) => err(e.to_string()),
            }
        }

        "comment_add" => {
            let Some(id) = resolve_id("id") else { return err("id required for comment_add") };
            let text = str_field("text").unwrap_or_default();
            let actor = str_field("actor");
            match store.comment(&id, &text, actor.as_deref()).await {
                Ok(task) => {
                    record_mutation(agent_loop.registry(), "comment_add", actor.as_deref(), id.as_str(), json!({ "length": text.len() }));
                    ok_with(json!({ "task": task }))
                }
                Err(e) => err(e.to_string()),
            }
        }

        "comments" => {
            let Some(id) = resolve_id("id") else { return err("id required for comments") };
            match store.comments(&id).await {
                Ok(comments) => ok_with(json!({ "comments": comments })),
                Err(e) => err(e.to_string()),
            }
        }

        "search" => {
            let query = str_field("query").unwrap_or_default();
            let opts = SearchOpts { limit: params.get("limit").and_then(Value::as_u64).map(|n| n as usize) };
            match store.search(&query, &opts).await {
                Ok(views) => ok_with(json!({ "tasks": views })),
                Err(e) => err(e.to_string()),
            }
        }

        "query" => {
            let expr = str_field("query").unwrap_or_default();
            let args = string_vec("args");
            match store.query(&expr, &args).await {
                Ok(views) => ok_with(json!({ "tasks": views })),
                Err(e) => err(e.to_string()),
            }
        }

        "dep_tree" => {
            let Some(id) = resolve_id("id") else { return err("id required for dep_tree") };
            let opts = DepTreeOpts { max_depth: params.get("maxDepth").and_then(Value::as_u64).map(|n| n as usize) };
            match store.dep_tree(&id, &opts).await {
                Ok(node) => ok_with(json!({ "tree": node })),
                Err(e) => err(e.to_string()),
            }
        }

        "activity" => {
            let opts = ActivityOpts { since: str_field("since"), limit: params.get("limit").and_then(Value::as_u64).map(|n| n as usize) };
            match store.activity(&opts).await {
                Ok(entries) => ok_with(json!({ "activity": entries })),
                Err(e) => err(e.to_string()),
            }
        }

        "types" => match store.types().await {
            Ok(types) => ok_with(json!({ "types": types })),
            Err(e) => err(e.to_string()),
        },

        "delete" => {
            let Some(id) = resolve_id("id") else { return err("id required for delete") };
            match store.delete(&id).await {
                Ok(()) => {
                    record_mutation(agent_loop.registry(), "delete", str_field("actor").as_deref(), id.as_str(), json!({}));
                    ok()
                }
                Err(e) => err(e.to_string()),
            }
        }

        other => err(format!("tasks_request: unhandled action \"{other}\"")),
    }
}

fn parse_task_status(raw: &str) -> Option<fleet_core::TaskStatus> {
    use fleet_core::TaskStatus::*;
    Some(match raw {
        "open" => Open,
        "in_progress" => InProgress,
        "blocked" => Blocked,
        "closed" => Closed,
        "done" => Done,
        "dead" => Dead,
        "failed" => Failed,
        _ => return None,
    })
}

/// Does `role` have the `advance_lifecycle` capability (spec §4.G `target`
/// validation column: "must be in the role's allowed advance set")? Consults
/// the Role Registry so a project-declared custom role can be granted the
/// capability, falling back to the built-in table for roles it doesn't name.
fn role_can_advance_lifecycle(role: &RoleId, roles: &crate::roles::RoleConfig) -> bool {
    roles.capabilities_for(role).can_advance_lifecycle
}

async fn dispatch_advance_lifecycle<S: TaskStore, P: AgentSpawner, C: Clock>(
    request: AdvanceLifecycleMsg,
    agent_loop: &AgentLoop<S, P>,
    clock: &C,
) -> Value {
    let AdvanceLifecycleMsg { agent_type, task_id, action, target, message, reason, agent_id } = request;
    let role = RoleId::from_str_id(&agent_type);
    if !role_can_advance_lifecycle(&role, agent_loop.roles()) {
        return err(format!("advance_lifecycle: role {role} is not permitted to advance lifecycle"));
    }

    let task_id = TaskId::new(task_id);
    if agent_loop.store().show(&task_id).await.is_err() {
        return err(format!("advance_lifecycle: task {task_id} does not exist"));
    }

    let agent_local_id = agent_id.map(AgentLocalId::new);
    if let Some(local_id) = &agent_local_id {
        if let Err(e) = agent_loop.registry().check_task_boundary(local_id, Some(&task_id)) {
            return err(e.to_string());
        }
    }
    let signal_agent_id = agent_local_id.unwrap_or_else(|| AgentLocalId::new(SYSTEM_AGENT_ID));
    let ts_ms = clock.epoch_ms();

    match action {
        LifecycleAction::Close => {
            agent_loop.lifecycle().post_close(&task_id, CloseSignal { reason, agent_id: signal_agent_id, ts_ms });
            ok()
        }
        LifecycleAction::Block => {
            agent_loop.lifecycle().post_advance(
                &task_id,
                AdvanceSignal { action: AdvanceAction::Defer, message, reason, agent_id: signal_agent_id, ts_ms },
            );
            ok()
        }
        LifecycleAction::Advance => {
            let advance_action = match target.as_deref() {
                Some("worker") => AdvanceAction::Worker,
                Some("scout") => AdvanceAction::Scout,
                other => return err(format!("advance_lifecycle: target must be worker or scout (got {other:?})")),
            };
            agent_loop.lifecycle().post_advance(&task_id, AdvanceSignal { action: advance_action, message, reason, agent_id: signal_agent_id, ts_ms });
            ok()
        }
    }
}

async fn dispatch_replace_agent<S: TaskStore, P: AgentSpawner>(
    role: String,
    task_id: String,
    context: Option<String>,
    agent_loop: &AgentLoop<S, P>,
) -> Value {
    let task_id = TaskId::new(task_id);
    let task_status = agent_loop.store().show(&task_id).await.ok().map(|t| t.status);
    let role = RoleId::from_str_id(&role);

    match plan_replace(agent_loop.is_paused(), task_id, task_status, role, context) {
        Ok(plan) => match agent_loop.execute_replace(plan).await {
            Ok(()) => ok(),
            Err(e) => err(e.to_string()),
        },
        Err(e) => err(e.to_string()),
    }
}

async fn dispatch_stop_agents_for_task<S: TaskStore, P: AgentSpawner>(
    task_id: TaskId,
    include_verifier: bool,
    wait_for_completion: bool,
    agent_loop: &AgentLoop<S, P>,
) -> Value {
    let stopped = match agent_loop.stop_agents_for_task(&task_id, include_verifier).await {
        Ok(n) => n,
        Err(e) => return err(e.to_string()),
    };

    if wait_for_completion {
        let mut waited_ms = 0;
        while waited_ms < STOP_WAIT_BUDGET_MS {
            let remaining = agent_loop.registry().get_active_by_task(&task_id).into_iter().filter(|a| include_verifier || a.role != RoleId::Verifier).count();
            if remaining == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(WAIT_POLL_INTERVAL_MS)).await;
            waited_ms += WAIT_POLL_INTERVAL_MS;
        }
    }

    ok_with(json!({ "stopped": stopped }))
}

async fn dispatch_wait_for_agent(agent_id: &str, timeout_ms: u64, registry: &Registry) -> Value {
    let local_id = AgentLocalId::new(agent_id);
    let mut waited_ms = 0;
    loop {
        match registry.get(&local_id) {
            None => return ok_with(json!({ "status": "not_found" })),
            Some(record) if record.status.is_terminal() => return ok_with(json!({ "status": record.status.to_string() })),
            Some(_) => {}
        }
        if waited_ms >= timeout_ms {
            return err_summary_timeout();
        }
        tokio::time::sleep(Duration::from_millis(WAIT_POLL_INTERVAL_MS)).await;
        waited_ms += WAIT_POLL_INTERVAL_MS;
    }
}

fn err_summary_timeout() -> Value {
    json!({ "ok": false, "timeout": true })
}

async fn dispatch_list_task_agents<S: TaskStore, P: AgentSpawner>(task_id: TaskId, agent_loop: &AgentLoop<S, P>) -> Value {
    let live = agent_loop.registry().get_by_task(&task_id);
    let persisted = agent_loop.store().list_agents_for_task(&task_id).await.unwrap_or_else(|e| {
        warn!(task_id = %task_id, error = %e, "failed to list persisted agents for task");
        Vec::new()
    });

    let mut seen_local: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut seen_tasks_agent: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut merged: Vec<Value> = Vec::new();

    for record in &live {
        seen_local.insert(record.id.to_string());
        if let Some(tasks_agent_id) = &record.tasks_agent_id {
            seen_tasks_agent.insert(tasks_agent_id.clone());
        }
        merged.push(json!({
            "id": record.id,
            "tasksAgentId": record.tasks_agent_id,
            "role": record.role,
            "status": record.status,
            "lastActivityMs": record.last_activity_ms,
            "source": "live",
        }));
    }

    for agent in persisted {
        if seen_local.contains(&agent.id) || seen_tasks_agent.contains(&agent.id) {
            continue;
        }
        let last_activity_ms = agent.last_heartbeat.as_deref().and_then(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok()).map(|dt| dt.timestamp_millis().max(0) as u64).unwrap_or(0);
        merged.push(json!({
            "id": agent.id,
            "tasksAgentId": agent.id,
            "role": Value::Null,
            "status": agent.state,
            "lastActivityMs": last_activity_ms,
            "source": "persisted",
        }));
    }

    merged.sort_by(|a, b| {
        let a_ms = a.get("lastActivityMs").and_then(Value::as_u64).unwrap_or(0);
        let b_ms = b.get("lastActivityMs").and_then(Value::as_u64).unwrap_or(0);
        b_ms.cmp(&a_ms)
    });

    ok_with(json!({ "agents": merged }))
}

async fn dispatch_read_message_history<S: TaskStore, P: AgentSpawner>(
    agent_id: &str,
    task_id: Option<&str>,
    limit: Option<usize>,
    agent_loop: &AgentLoop<S, P>,
) -> Value {
    let task_id = task_id.map(TaskId::new);

    if let Some(live) = agent_loop.registry().resolve_for_history(agent_id) {
        if let Err(e) = agent_loop.registry().check_task_boundary(&live.id, task_id.as_ref()) {
            return err(e.to_string());
        }
        let messages: Vec<Value> = live.events.iter().map(|e| e.payload.clone()).collect();
        let tool_calls = pair_tool_calls(&messages);
        return ok_with(json!({
            "agent": crate::registry::ActiveSummary::from_record(&live),
            "messages": limited(messages, limit),
            "toolCalls": tool_calls,
        }));
    }

    let messages = match agent_loop.store().read_agent_messages(agent_id, limit).await {
        Ok(messages) => messages,
        Err(e) => return err(e.to_string()),
    };
    let payloads: Vec<Value> = messages.into_iter().map(|m| m.payload).collect();
    let tool_calls = pair_tool_calls(&payloads);
    ok_with(json!({
        "agent": Value::Null,
        "messages": payloads,
        "toolCalls": tool_calls,
    }))
}

fn limited(messages: Vec<Value>, limit: Option<usize>) -> Vec<Value> {
    match limit {
        Some(n) => {
            let skip = messages.len().saturating_sub(n);
            messages.into_iter().skip(skip).collect()
        }
        None => messages,
    }
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
