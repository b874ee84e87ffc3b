//! `listActiveSummaries()` projection (spec §4.C).

use fleet_core::{AgentLocalId, AgentRecord, AgentRecordStatus, RoleId, TaskId, Usage};

/// Lightweight projection of an active agent record for IPC responses
/// (`list_active_agents`), avoiding a full event-ring serialization.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ActiveSummary {
    pub id: AgentLocalId,
    pub role: RoleId,
    pub task_id: Option<TaskId>,
    pub status: AgentRecordStatus,
    pub usage: Usage,
    pub last_activity_ms: u64,
}

impl ActiveSummary {
    pub fn from_record(record: &AgentRecord) -> Self {
        Self {
            id: record.id.clone(),
            role: record.role.clone(),
            task_id: record.task_id.clone(),
            status: record.status,
            usage: record.usage,
            last_activity_ms: record.last_activity_ms,
        }
    }
}
