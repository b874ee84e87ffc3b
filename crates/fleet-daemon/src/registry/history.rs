//! `readMessageHistory` resolution — spec §4.C.
//!
//! Accepts either a local id or a `tasksAgentId`, also a colon-suffixed
//! variant (the id's last segment after `:`); prefers a live agent's event
//! log, falling back to the store's persisted messages. `toolCalls` pairs
//! `tool_use` content items with their matching `tool_result` by
//! `tool_use_id`.

use fleet_core::{AgentLocalId, AgentRecord};
use serde_json::Value;

use super::summary::ActiveSummary;

/// A paired tool invocation: the `tool_use` content item and, once seen,
/// its matching `tool_result`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ToolCall {
    pub tool_use_id: String,
    pub tool_use: Value,
    pub tool_result: Option<Value>,
}

/// `{agent, messages, toolCalls}` (spec §4.C). `agent` is the lightweight
/// summary projection, not the full record with its event ring.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MessageHistory {
    pub agent: Option<ActiveSummary>,
    pub messages: Vec<Value>,
    pub tool_calls: Vec<ToolCall>,
}

/// Whichever source of truth a resolved id actually came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryResolution {
    LiveAgent,
    Store,
}

/// Strip a colon-suffixed variant down to its last segment, per spec §4.C
/// ("also accept a colon-suffixed variant").
pub fn normalize_agent_id(raw: &str) -> &str {
    raw.rsplit(':').next().unwrap_or(raw)
}

/// Resolve an id (local or `tasksAgentId`, colon-suffixed or not) against
/// the live registry lookups the caller provides.
pub fn resolve_live_agent(
    raw_id: &str,
    by_local: impl Fn(&AgentLocalId) -> Option<AgentRecord>,
    by_tasks_agent_id: impl Fn(&str) -> Option<AgentRecord>,
) -> Option<AgentRecord> {
    let normalized = normalize_agent_id(raw_id);
    by_local(&AgentLocalId::new(normalized)).or_else(|| by_tasks_agent_id(normalized))
}

/// Pair `tool_use` content items with their `tool_result` counterpart by
/// `tool_use_id`, preserving the order `tool_use` items first appeared in.
pub fn pair_tool_calls(messages: &[Value]) -> Vec<ToolCall> {
    let mut calls: Vec<ToolCall> = Vec::new();
    let mut index_of: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for message in messages {
        let Some(content) = message.get("content").and_then(Value::as_array) else { continue };
        for item in content {
            match item.get("type").and_then(Value::as_str) {
                Some("tool_use") => {
                    if let Some(id) = item.get("id").and_then(Value::as_str) {
                        index_of.insert(id.to_string(), calls.len());
                        calls.push(ToolCall { tool_use_id: id.to_string(), tool_use: item.clone(), tool_result: None });
                    }
                }
                Some("tool_result") => {
                    if let Some(id) = item.get("tool_use_id").and_then(Value::as_str) {
                        if let Some(&idx) = index_of.get(id) {
                            calls[idx].tool_result = Some(item.clone());
                        }
                    }
                }
                _ => {}
            }
        }
    }
    calls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_colon_suffix() {
        assert_eq!(normalize_agent_id("agent-1:42"), "42");
        assert_eq!(normalize_agent_id("agent-1"), "agent-1");
    }

    #[test]
    fn pairs_tool_use_with_matching_result() {
        let messages = vec![serde_json::json!({
            "content": [
                {"type": "tool_use", "id": "call-1", "name": "read_file"},
                {"type": "tool_result", "tool_use_id": "call-1", "content": "ok"},
            ]
        })];
        let calls = pair_tool_calls(&messages);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool_use_id, "call-1");
        assert!(calls[0].tool_result.is_some());
    }

    #[test]
    fn unmatched_tool_use_has_no_result() {
        let messages = vec![serde_json::json!({
            "content": [{"type": "tool_use", "id": "call-2", "name": "grep"}]
        })];
        let calls = pair_tool_calls(&messages);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].tool_result.is_none());
    }
}
