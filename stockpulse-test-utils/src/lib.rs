//! StockPulse Test Utilities
//!
//! Shared test infrastructure for the StockPulse workspace:
//! - Mock collaborators (scheduler backend, agent invoker, event source, store)
//! - Proptest generators for schedules, execution history and tickers
//! - Fixtures for common scenarios

// Re-export in-memory collaborators from their source crates
pub use stockpulse_core::MemoryStore;
pub use stockpulse_events::{ChannelEventSource, Publisher};
pub use stockpulse_scheduler::{MockScheduler, ScheduleCall, ScheduleOp};

pub use stockpulse_core::{
    AgentEvent, AgentInvoker, BackendError, ExecutionLog, InvocationPayload, InvocationResponse,
    Schedule, Timestamp,
};

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use stockpulse_events::AgentActivity;

// ============================================================================
// MOCK AGENT INVOKER
// ============================================================================

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub message: String,
    pub agent_id: String,
    /// Activity processing flag at the moment of the call, when observed.
    pub processing: Option<bool>,
}

#[derive(Debug, Clone)]
enum Script {
    Respond(InvocationResponse),
    Unreachable(String),
}

/// Scripted agent-invocation collaborator.
#[derive(Clone)]
pub struct MockAgentInvoker {
    script: Script,
    calls: Arc<Mutex<Vec<Invocation>>>,
    observed: Option<AgentActivity>,
}

impl MockAgentInvoker {
    /// Always answer with `response`.
    pub fn responding(response: InvocationResponse) -> Self {
        Self::with_script(Script::Respond(response))
    }

    /// Always fail at the transport level.
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self::with_script(Script::Unreachable(reason.into()))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            calls: Arc::new(Mutex::new(Vec::new())),
            observed: None,
        }
    }

    /// Record `activity.is_processing()` on every call.
    pub fn observing(mut self, activity: AgentActivity) -> Self {
        self.observed = Some(activity);
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl AgentInvoker for MockAgentInvoker {
    async fn invoke(
        &self,
        message: &str,
        agent_id: &str,
    ) -> Result<InvocationResponse, BackendError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Invocation {
                message: message.to_string(),
                agent_id: agent_id.to_string(),
                processing: self.observed.as_ref().map(AgentActivity::is_processing),
            });

        match &self.script {
            Script::Unreachable(reason) => Err(BackendError::Transport(reason.clone())),
            Script::Respond(response) => Ok(response.clone()),
        }
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for StockPulse types.

    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    /// Upper-case ticker symbol, 1-5 letters.
    pub fn arb_ticker() -> impl Strategy<Value = String> {
        "[A-Z]{1,5}"
    }

    /// Ticker as a user might type it: any case, stray whitespace.
    pub fn arb_raw_ticker() -> impl Strategy<Value = String> {
        (" {0,2}", "[A-Za-z]{1,5}", " {0,2}").prop_map(|(a, t, b)| format!("{a}{t}{b}"))
    }

    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        // 2020-01-01 .. 2030-01-01
        (1_577_836_800i64..1_893_456_000i64)
            .prop_map(|secs| Utc.timestamp_opt(secs, 0).single().unwrap_or_default())
    }

    pub fn arb_schedule() -> impl Strategy<Value = Schedule> {
        (
            "S[0-9]{1,3}",
            "A[0-9]{1,3}",
            any::<bool>(),
            prop_oneof![
                Just("0 7 * * *"),
                Just("0 9 * * 1-5"),
                Just("*/15 * * * *"),
                Just("30 16 * * 5"),
            ],
            proptest::option::of(arb_timestamp()),
        )
            .prop_map(|(id, agent_id, is_active, cron, next_run_time)| Schedule {
                id,
                agent_id,
                is_active,
                cron_expression: cron.to_string(),
                timezone: "America/New_York".to_string(),
                next_run_time,
                last_run_at: None,
            })
    }

    pub fn arb_execution_log() -> impl Strategy<Value = ExecutionLog> {
        ("e[0-9]{1,4}", arb_timestamp(), any::<bool>()).prop_map(|(id, executed_at, success)| {
            ExecutionLog {
                id,
                executed_at,
                success,
                detail: (!success).then(|| "timeout".to_string()),
            }
        })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    /// Daily 7 AM Eastern schedule `S1` owned by agent `A1`.
    pub fn morning_schedule(active: bool) -> Schedule {
        Schedule {
            id: "S1".to_string(),
            agent_id: "A1".to_string(),
            is_active: active,
            cron_expression: "0 7 * * *".to_string(),
            timezone: "America/New_York".to_string(),
            next_run_time: Utc.with_ymd_and_hms(2026, 2, 20, 12, 0, 0).single(),
            last_run_at: Utc.with_ymd_and_hms(2026, 2, 19, 12, 0, 0).single(),
        }
    }

    pub fn execution(id: &str, executed_at: Timestamp, success: bool) -> ExecutionLog {
        ExecutionLog {
            id: id.to_string(),
            executed_at,
            success,
            detail: None,
        }
    }

    /// Successful run on `sess-1` that emailed `recipient` about `tickers`.
    pub fn emailed_invocation(tickers: &[&str], recipient: &str) -> InvocationResponse {
        invocation_with_result(
            "sess-1",
            json!({
                "stocks_analyzed": tickers,
                "email_sent": "true",
                "email_recipient": recipient,
            }),
        )
    }

    pub fn invocation_with_result(session_id: &str, result: serde_json::Value) -> InvocationResponse {
        InvocationResponse {
            success: true,
            session_id: Some(session_id.to_string()),
            response: Some(InvocationPayload {
                result: Some(result),
            }),
            error: None,
        }
    }

    /// Structured failure carrying `error` text.
    pub fn failed_invocation(session_id: Option<&str>, error: Option<&str>) -> InvocationResponse {
        InvocationResponse {
            success: false,
            session_id: session_id.map(str::to_string),
            response: None,
            error: error.map(str::to_string),
        }
    }
}
