//! Schedule and execution history records as served by the remote scheduler.

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// One backend-owned recurring job.
///
/// `next_run_time` is only meaningful while `is_active` is true. The backend
/// is authoritative: local code never flips `is_active` without re-reading it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub agent_id: String,
    pub is_active: bool,
    pub cron_expression: String,
    pub timezone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<Timestamp>,
}

impl Schedule {
    /// Next firing time, hidden while paused.
    pub fn effective_next_run(&self) -> Option<Timestamp> {
        if self.is_active {
            self.next_run_time
        } else {
            None
        }
    }

    pub fn status_label(&self) -> &'static str {
        if self.is_active {
            "Active"
        } else {
            "Paused"
        }
    }
}

/// Immutable record of one past firing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub id: String,
    pub executed_at: Timestamp,
    pub success: bool,
    #[serde(default, alias = "error", skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Sort most-recent-first and cap to `limit` entries.
pub fn recent_window(mut logs: Vec<ExecutionLog>, limit: usize) -> Vec<ExecutionLog> {
    logs.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
    logs.truncate(limit);
    logs
}

/// Filter for listing schedules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

impl ScheduleFilter {
    pub fn for_agent(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
        }
    }

    pub fn matches(&self, schedule: &Schedule) -> bool {
        self.agent_id
            .as_deref()
            .map_or(true, |agent| schedule.agent_id == agent)
    }
}
