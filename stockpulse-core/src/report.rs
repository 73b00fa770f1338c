//! Agent invocation results and the report records derived from them.

use crate::error::BackendError;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Envelope returned by the agent-invocation service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<InvocationPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationPayload {
    /// Left untyped so a result of the wrong shape degrades to defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
}

impl InvocationResponse {
    pub fn manager_response(&self) -> ManagerResponse {
        self.response
            .as_ref()
            .and_then(|payload| payload.result.as_ref())
            .map(ManagerResponse::from_value)
            .unwrap_or_default()
    }
}

/// Fields the manager agent reports back after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerResponse {
    pub status: Option<String>,
    pub stocks_analyzed: Option<Vec<String>>,
    pub report_date: Option<String>,
    /// `"true"` / `"false"` as a string on the wire.
    pub email_sent: Option<String>,
    pub email_recipient: Option<String>,
    pub portfolio_summary: Option<String>,
    pub key_highlights: Option<Vec<String>>,
    pub errors: Option<Vec<String>>,
}

impl ManagerResponse {
    /// Lenient extraction: fields of the wrong type are treated as absent.
    pub fn from_value(value: &JsonValue) -> Self {
        let text = |key: &str| value.get(key).and_then(|v| v.as_str()).map(str::to_string);
        let list = |key: &str| {
            value.get(key).and_then(|v| v.as_array()).map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect::<Vec<_>>()
            })
        };
        let email_sent = match value.get("email_sent") {
            Some(JsonValue::String(s)) => Some(s.clone()),
            Some(JsonValue::Bool(b)) => Some(b.to_string()),
            _ => None,
        };

        Self {
            status: text("status"),
            stocks_analyzed: list("stocks_analyzed"),
            report_date: text("report_date"),
            email_sent,
            email_recipient: text("email_recipient"),
            portfolio_summary: text("portfolio_summary"),
            key_highlights: list("key_highlights"),
            errors: list("errors"),
        }
    }

    pub fn email_was_sent(&self) -> bool {
        self.email_sent.as_deref() == Some("true")
    }

    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|errors| !errors.is_empty())
    }
}

/// A delivered report as kept in local history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredReport {
    pub id: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub stocks_analyzed: Vec<String>,
    pub portfolio_summary: String,
    pub key_highlights: Vec<String>,
    pub email_sent: String,
    pub email_recipient: String,
    pub status: String,
    pub errors: Vec<String>,
}

impl StoredReport {
    /// Build a report, defaulting whatever the agent left out.
    pub fn from_manager(
        id: impl Into<String>,
        data: &ManagerResponse,
        requested: &[String],
        recipient: &str,
        today: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            date: data
                .report_date
                .clone()
                .unwrap_or_else(|| today.format("%Y-%m-%d").to_string()),
            stocks_analyzed: data
                .stocks_analyzed
                .clone()
                .unwrap_or_else(|| requested.to_vec()),
            portfolio_summary: data.portfolio_summary.clone().unwrap_or_default(),
            key_highlights: data.key_highlights.clone().unwrap_or_default(),
            email_sent: data
                .email_sent
                .clone()
                .unwrap_or_else(|| "false".to_string()),
            email_recipient: data
                .email_recipient
                .clone()
                .unwrap_or_else(|| recipient.to_string()),
            status: data
                .status
                .clone()
                .unwrap_or_else(|| "completed".to_string()),
            errors: data.errors.clone().unwrap_or_default(),
        }
    }

    /// Inclusive `YYYY-MM-DD` range check; string order equals date order.
    pub fn within(&self, from: Option<&str>, to: Option<&str>) -> bool {
        if from.is_some_and(|from| self.date.as_str() < from) {
            return false;
        }
        if to.is_some_and(|to| self.date.as_str() > to) {
            return false;
        }
        true
    }
}

/// External collaborator that runs an agent for a natural-language instruction.
///
/// Transport failures are `Err`; a non-success envelope is `Ok` with
/// `success == false`.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, message: &str, agent_id: &str)
        -> Result<InvocationResponse, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 19).unwrap()
    }

    #[test]
    fn test_manager_response_ignores_wrong_types() {
        let data = ManagerResponse::from_value(&json!({
            "stocks_analyzed": "AAPL",
            "errors": [1, "timeout"],
            "email_sent": true
        }));
        assert!(data.stocks_analyzed.is_none());
        assert_eq!(data.errors, Some(vec!["timeout".to_string()]));
        assert!(data.email_was_sent());
    }

    #[test]
    fn test_report_defaults() {
        let requested = vec!["AAPL".to_string()];
        let report = StoredReport::from_manager(
            "report-1",
            &ManagerResponse::default(),
            &requested,
            "user@x.com",
            today(),
        );
        assert_eq!(report.date, "2026-02-19");
        assert_eq!(report.stocks_analyzed, requested);
        assert_eq!(report.status, "completed");
        assert_eq!(report.email_sent, "false");
        assert_eq!(report.email_recipient, "user@x.com");
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_invocation_without_result_yields_default_response() {
        let response: InvocationResponse =
            serde_json::from_value(json!({"success": true, "session_id": "sess-1"})).unwrap();
        assert_eq!(response.manager_response(), ManagerResponse::default());
    }

    #[test]
    fn test_report_date_range() {
        let mut report = StoredReport::from_manager(
            "r",
            &ManagerResponse::default(),
            &[],
            "",
            today(),
        );
        report.date = "2026-02-18".to_string();
        assert!(report.within(Some("2026-02-18"), Some("2026-02-18")));
        assert!(!report.within(Some("2026-02-19"), None));
        assert!(!report.within(None, Some("2026-02-17")));
        assert!(report.within(None, None));
    }
}
