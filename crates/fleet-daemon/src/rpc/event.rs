//! Typed view over the agent subprocess's JSON event stream (spec §6
//! "Agent subprocess protocol"). [`handle_event`](super::handle_event) works
//! directly on `serde_json::Value` so it never rejects a forward-compatible
//! field the spec hasn't named yet; this enum exists for the transport side
//! (a real [`crate::spawner::SubprocessHandle`]) to validate a raw stdout
//! line carries a recognized `type` tag before it's queued for dispatch.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventParseError {
    #[error("line is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("event has no string \"type\" field")]
    MissingType,
}

/// The event `type` tags a subprocess is expected to emit, plus a catch-all
/// for anything else (new event kinds are additive, never a parse failure).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEventKind {
    MessageUpdate,
    MessageEnd,
    AutoCompactionEnd,
    ToolUse,
    ToolResult,
    AgentEnd,
    RpcExit,
    GetState,
    Other(String),
}

impl AgentEventKind {
    fn from_tag(tag: &str) -> Self {
        match tag {
            "message_update" => Self::MessageUpdate,
            "message_end" => Self::MessageEnd,
            "auto_compaction_end" => Self::AutoCompactionEnd,
            "tool_use" => Self::ToolUse,
            "tool_result" => Self::ToolResult,
            "agent_end" => Self::AgentEnd,
            "rpc_exit" => Self::RpcExit,
            "get_state" => Self::GetState,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AgentEnd | Self::RpcExit)
    }
}

/// One line of the subprocess's event stream: its recognized kind plus the
/// full raw payload, which is what actually flows into `handle_event`.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentEvent {
    pub kind: AgentEventKind,
    pub raw: Value,
}

impl AgentEvent {
    /// Parse one line-delimited JSON event (spec §6). Any object with a
    /// string `type` field parses; unrecognized tags fall back to
    /// [`AgentEventKind::Other`] rather than failing, so the subprocess
    /// protocol can grow without a transport-layer rebuild.
    pub fn parse(line: &str) -> Result<Self, EventParseError> {
        let raw: Value = serde_json::from_str(line).map_err(|e| EventParseError::InvalidJson(e.to_string()))?;
        let tag = raw.get("type").and_then(Value::as_str).ok_or(EventParseError::MissingType)?;
        Ok(Self { kind: AgentEventKind::from_tag(tag), raw })
    }

    pub fn into_value(self) -> Value {
        self.raw
    }
}

/// `message_end`'s nested usage block (spec §6), used by real subprocess
/// handles that want to log usage without reaching into raw JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageEndUsage {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
    #[serde(rename = "cacheRead", default)]
    pub cache_read: u64,
    #[serde(rename = "cacheWrite", default)]
    pub cache_write: u64,
    #[serde(rename = "totalTokens")]
    pub total_tokens: Option<u64>,
}
