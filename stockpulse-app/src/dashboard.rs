//! Orchestration facade.
//!
//! The one place that drives both the schedule controller and the live
//! activity consumer, and that owns the persisted dashboard state
//! (watchlist, delivery settings, report history).

use crate::api_client::AgentClient;
use crate::config::PulseConfig;
use crate::error::AppError;
use crate::persistence::JsonFileStore;
use crate::realtime::WsEventSource;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use stockpulse_core::store::{
    load_json, save_json, EMAIL_KEY, REPORTS_KEY, TIMEZONE_KEY, WATCHLIST_KEY,
};
use stockpulse_core::{
    cron_to_human, AgentInvoker, BackendError, ExecutionLog, KeyValueStore, ManagerResponse,
    Notification, Schedule, StoreError, StoredReport, ValidationError,
};
use stockpulse_events::{ActivityState, AgentActivity, EventSource};
use stockpulse_scheduler::{ScheduleApi, ScheduleClient, ScheduleController, ScheduleState};
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_TIMEZONE: &str = "America/New_York";

const IN_PROGRESS: &str = "Analyzing your portfolio... This may take a moment.";
const ANALYSIS_FAILED: &str = "Analysis failed. Please try again.";
const NETWORK_ERROR: &str = "Network error. Please check your connection and try again.";
const NO_EMAIL: &str = "Analysis complete. No email was sent.";
const REPORT_NOT_SAVED: &str = "The report could not be saved";

/// Instruction sent to the manager agent for one run.
pub fn run_prompt(recipient: &str, tickers: &[String]) -> String {
    format!(
        "Analyze the following stocks and send the report to {}: {}",
        recipient,
        tickers.join(", ")
    )
}

/// Outcome message for a completed run.
pub fn classify_outcome(data: &ManagerResponse, recipient: &str) -> Notification {
    if let Some(errors) = data.errors.as_ref().filter(|errors| !errors.is_empty()) {
        Notification::error(format!(
            "Analysis completed with errors: {}",
            errors.join(", ")
        ))
    } else if data.email_was_sent() {
        Notification::success(format!(
            "Report sent to {}.",
            data.email_recipient.as_deref().unwrap_or(recipient)
        ))
    } else {
        Notification::info(NO_EMAIL)
    }
}

/// Trim and upper-case a typed ticker; `None` if nothing is left.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let ticker = raw.trim().to_uppercase();
    (!ticker.is_empty()).then_some(ticker)
}

/// Persisted, user-owned state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardState {
    pub watchlist: Vec<String>,
    pub email: String,
    pub timezone: String,
    /// Most recent first.
    pub reports: Vec<StoredReport>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            watchlist: Vec::new(),
            email: String::new(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            reports: Vec::new(),
        }
    }
}

impl DashboardState {
    /// Read every key, falling back to the default for missing or corrupt values.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let defaults = Self::default();
        Self {
            watchlist: load_or(store, WATCHLIST_KEY, defaults.watchlist),
            email: load_or(store, EMAIL_KEY, defaults.email),
            timezone: load_or(store, TIMEZONE_KEY, defaults.timezone),
            reports: load_or(store, REPORTS_KEY, defaults.reports),
        }
    }
}

fn load_or<T: serde::de::DeserializeOwned>(store: &dyn KeyValueStore, key: &str, default: T) -> T {
    match load_json(store, key) {
        Ok(Some(value)) => value,
        Ok(None) => default,
        Err(err) => {
            warn!(key, error = %err, "Ignoring unreadable stored value");
            default
        }
    }
}

/// Result of one `run_now`.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub notification: Notification,
    /// Present only when the agent reported success.
    pub report: Option<StoredReport>,
    /// Set when the report was produced but could not be written to the store.
    pub store_error: Option<StoreError>,
    pub session_id: Option<String>,
    /// Live activity as it stood just before the stream was detached.
    pub activity: ActivityState,
}

/// Identifiers and limits the facade needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub schedule_id: String,
    pub manager_agent_id: String,
    pub log_limit: usize,
    /// Agent id to display name.
    pub roster: HashMap<String, String>,
}

/// Ends a run: clears the busy flag, then detaches the stream.
struct RunGuard(AgentActivity);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.set_processing(false);
        self.0.detach();
    }
}

pub struct Dashboard {
    schedule: ScheduleController,
    activity: AgentActivity,
    invoker: Arc<dyn AgentInvoker>,
    store: Arc<dyn KeyValueStore>,
    settings: DashboardSettings,
    state: DashboardState,
    notification: Option<Notification>,
}

impl Dashboard {
    pub fn new(
        schedules: Arc<dyn ScheduleApi>,
        invoker: Arc<dyn AgentInvoker>,
        events: Arc<dyn EventSource>,
        store: Arc<dyn KeyValueStore>,
        settings: DashboardSettings,
    ) -> Self {
        Self::with_activity(
            schedules,
            invoker,
            AgentActivity::new(events),
            store,
            settings,
        )
    }

    /// Build around an existing activity consumer, e.g. one already observed.
    pub fn with_activity(
        schedules: Arc<dyn ScheduleApi>,
        invoker: Arc<dyn AgentInvoker>,
        activity: AgentActivity,
        store: Arc<dyn KeyValueStore>,
        settings: DashboardSettings,
    ) -> Self {
        let schedule = ScheduleController::new(
            schedules,
            settings.schedule_id.clone(),
            settings.manager_agent_id.clone(),
        );
        let state = DashboardState::load(store.as_ref());
        Self {
            schedule,
            activity,
            invoker,
            store,
            settings,
            state,
            notification: None,
        }
    }

    /// Wire the HTTP, WebSocket and file-backed collaborators from config.
    pub fn from_config(config: &PulseConfig) -> Result<Self, AppError> {
        let timeout = config.request_timeout();
        let schedules = ScheduleClient::new(&config.scheduler_base_url, config.api_key(), timeout)?;
        let invoker = AgentClient::new(&config.agent_base_url, config.api_key(), timeout)?;
        let events = WsEventSource::new(&config.events_ws_endpoint, config.api_key())?;
        let store = JsonFileStore::new(&config.store_path);

        let settings = DashboardSettings {
            schedule_id: config.schedule_id.clone(),
            manager_agent_id: config.manager_agent_id.clone(),
            log_limit: config.log_limit,
            roster: config
                .agents
                .iter()
                .map(|agent| (agent.id.clone(), agent.name.clone()))
                .collect(),
        };
        Ok(Self::new(
            Arc::new(schedules),
            Arc::new(invoker),
            Arc::new(events),
            Arc::new(store),
            settings,
        ))
    }

    // === Runs ===

    /// Run the analysis for `tickers` and deliver the report to `recipient`.
    ///
    /// Tickers are normalized first and blank entries dropped. Only validation
    /// failures are `Err`. Backend and transport failures end the run with an
    /// error notification. Whatever happens, the busy flag is cleared and the
    /// event stream detached before this returns.
    pub async fn run_now(
        &mut self,
        tickers: &[String],
        recipient: &str,
    ) -> Result<RunOutcome, ValidationError> {
        let tickers: Vec<String> = tickers.iter().filter_map(|t| normalize_ticker(t)).collect();
        let recipient = recipient.trim();
        if let Err(err) = validate_run(&tickers, recipient) {
            self.notification = Some(Notification::error(err.to_string()));
            return Err(err);
        }

        self.notification = Some(Notification::info(IN_PROGRESS));
        self.activity.set_processing(true);
        let finish = RunGuard(self.activity.clone());

        info!(tickers = ?tickers, agent_id = %self.settings.manager_agent_id, "Starting analysis run");
        let message = run_prompt(recipient, &tickers);
        let result = self
            .invoker
            .invoke(&message, &self.settings.manager_agent_id)
            .await;

        let mut session_id = None;
        let mut store_error = None;
        let (notification, report) = match result {
            Err(BackendError::Transport(reason)) => {
                warn!(error = %reason, "Agent invocation transport failure");
                (Notification::error(NETWORK_ERROR), None)
            }
            Err(err) => {
                warn!(error = %err, "Agent invocation failed");
                (Notification::error(or_fallback(err.user_message(), ANALYSIS_FAILED)), None)
            }
            Ok(response) => {
                if let Some(id) = response.session_id.as_deref() {
                    self.activity.attach(Some(id));
                    session_id = Some(id.to_string());
                }
                if response.success {
                    let data = response.manager_response();
                    let report = StoredReport::from_manager(
                        format!("report-{}", Uuid::now_v7()),
                        &data,
                        &tickers,
                        recipient,
                        Utc::now().date_naive(),
                    );
                    let mut notification = classify_outcome(&data, recipient);
                    if let Err(err) = self.record_report(report.clone()) {
                        warn!(error = %err, "Failed to persist report history");
                        notification = Notification::error(format!(
                            "{} {}: {}",
                            notification.message, REPORT_NOT_SAVED, err
                        ));
                        store_error = Some(err);
                    }
                    (notification, Some(report))
                } else {
                    let message = response.error.unwrap_or_default();
                    warn!(error = %message, "Agent reported failure");
                    (Notification::error(or_fallback(message, ANALYSIS_FAILED)), None)
                }
            }
        };

        let activity = self.activity.snapshot();
        drop(finish);

        info!(level = ?notification.level, session_id = ?session_id, "Analysis run finished");
        self.notification = Some(notification.clone());
        Ok(RunOutcome {
            notification,
            report,
            store_error,
            session_id,
            activity,
        })
    }

    /// `run_now` over the stored watchlist and delivery email.
    pub async fn run_watchlist(&mut self) -> Result<RunOutcome, ValidationError> {
        let tickers = self.state.watchlist.clone();
        let recipient = self.state.email.clone();
        self.run_now(&tickers, &recipient).await
    }

    /// Prepend to history; memory changes only once the store accepted it.
    fn record_report(&mut self, report: StoredReport) -> Result<(), StoreError> {
        let mut reports = Vec::with_capacity(self.state.reports.len() + 1);
        reports.push(report);
        reports.extend(self.state.reports.iter().cloned());
        save_json(self.store.as_ref(), REPORTS_KEY, &reports)?;
        self.state.reports = reports;
        Ok(())
    }

    // === Schedule ===

    pub async fn toggle_schedule(&mut self) -> Notification {
        let notification = self.schedule.toggle().await;
        self.notification = Some(notification.clone());
        notification
    }

    /// Reload the schedule and its recent execution history.
    pub async fn refresh(&self) -> ScheduleState {
        self.schedule.load().await;
        self.schedule.refresh_logs(self.settings.log_limit).await;
        self.schedule.state()
    }

    pub async fn refresh_logs(&self, limit: usize) -> Vec<ExecutionLog> {
        self.schedule.refresh_logs(limit).await
    }

    /// Shared handle; clones observe loading and in-flight toggles.
    pub fn schedule_controller(&self) -> &ScheduleController {
        &self.schedule
    }

    pub fn schedule_state(&self) -> ScheduleState {
        self.schedule.state()
    }

    pub fn schedule(&self) -> Option<Schedule> {
        self.schedule.schedule()
    }

    pub fn execution_logs(&self) -> Vec<ExecutionLog> {
        self.schedule.logs()
    }

    pub fn toggle_pending(&self) -> bool {
        self.schedule.toggle_pending()
    }

    /// Cadence of the held schedule in words.
    pub fn schedule_phrase(&self) -> Option<String> {
        self.schedule()
            .map(|schedule| cron_to_human(&schedule.cron_expression))
    }

    // === Live activity ===

    pub fn activity(&self) -> &AgentActivity {
        &self.activity
    }

    /// Name of the agent currently acting, falling back to the roster.
    pub fn active_agent_name(&self) -> Option<String> {
        let state = self.activity.snapshot();
        state.active_agent_name.or_else(|| {
            state
                .active_agent_id
                .and_then(|id| self.settings.roster.get(&id).cloned())
        })
    }

    pub fn agent_name(&self, agent_id: &str) -> Option<&str> {
        self.settings.roster.get(agent_id).map(String::as_str)
    }

    pub fn roster(&self) -> &HashMap<String, String> {
        &self.settings.roster
    }

    // === Watchlist and settings ===

    pub fn watchlist(&self) -> &[String] {
        &self.state.watchlist
    }

    /// Add a ticker. `Ok(false)` for blank input or a symbol already listed.
    pub fn add_ticker(&mut self, raw: &str) -> Result<bool, StoreError> {
        let Some(ticker) = normalize_ticker(raw) else {
            return Ok(false);
        };
        if self.state.watchlist.contains(&ticker) {
            return Ok(false);
        }
        let mut watchlist = self.state.watchlist.clone();
        watchlist.push(ticker);
        self.commit_watchlist(watchlist)?;
        Ok(true)
    }

    pub fn remove_ticker(&mut self, raw: &str) -> Result<bool, StoreError> {
        let Some(ticker) = normalize_ticker(raw) else {
            return Ok(false);
        };
        if !self.state.watchlist.contains(&ticker) {
            return Ok(false);
        }
        let watchlist = self
            .state
            .watchlist
            .iter()
            .filter(|t| **t != ticker)
            .cloned()
            .collect();
        self.commit_watchlist(watchlist)?;
        Ok(true)
    }

    fn commit_watchlist(&mut self, watchlist: Vec<String>) -> Result<(), StoreError> {
        save_json(self.store.as_ref(), WATCHLIST_KEY, &watchlist)?;
        self.state.watchlist = watchlist;
        Ok(())
    }

    pub fn email(&self) -> &str {
        &self.state.email
    }

    pub fn timezone(&self) -> &str {
        &self.state.timezone
    }

    /// Persist both delivery settings or neither.
    ///
    /// If the timezone write fails the stored email is put back, and the
    /// in-memory values only change once both writes succeeded.
    pub fn save_settings(&mut self, email: &str, timezone: &str) -> Result<(), StoreError> {
        let email = email.trim().to_string();
        let timezone = timezone.trim().to_string();
        save_json(self.store.as_ref(), EMAIL_KEY, &email)?;
        if let Err(err) = save_json(self.store.as_ref(), TIMEZONE_KEY, &timezone) {
            if let Err(restore) = save_json(self.store.as_ref(), EMAIL_KEY, &self.state.email) {
                warn!(error = %restore, "Failed to restore delivery email");
            }
            return Err(err);
        }
        self.state.email = email;
        self.state.timezone = timezone;
        Ok(())
    }

    // === Reports ===

    pub fn reports(&self) -> &[StoredReport] {
        &self.state.reports
    }

    pub fn latest_report(&self) -> Option<&StoredReport> {
        self.state.reports.first()
    }

    /// Reports dated within `[from, to]`, either bound optional.
    pub fn reports_between(&self, from: Option<&str>, to: Option<&str>) -> Vec<&StoredReport> {
        self.state
            .reports
            .iter()
            .filter(|report| report.within(from, to))
            .collect()
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Last user-visible outcome message.
    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }
}

fn validate_run(tickers: &[String], recipient: &str) -> Result<(), ValidationError> {
    if tickers.iter().all(|ticker| ticker.trim().is_empty()) {
        return Err(ValidationError::EmptyWatchlist);
    }
    if recipient.trim().is_empty() {
        return Err(ValidationError::MissingRecipient);
    }
    Ok(())
}

fn or_fallback(message: String, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockpulse_core::NotificationLevel;

    fn response(errors: Option<Vec<&str>>, email_sent: Option<&str>) -> ManagerResponse {
        ManagerResponse {
            errors: errors.map(|e| e.into_iter().map(str::to_string).collect()),
            email_sent: email_sent.map(str::to_string),
            ..ManagerResponse::default()
        }
    }

    #[test]
    fn test_run_prompt() {
        let tickers = vec!["AAPL".to_string(), "MSFT".to_string()];
        assert_eq!(
            run_prompt("user@x.com", &tickers),
            "Analyze the following stocks and send the report to user@x.com: AAPL, MSFT"
        );
    }

    #[test]
    fn test_errors_win_over_email() {
        let outcome = classify_outcome(&response(Some(vec!["a", "b"]), Some("true")), "u@x.com");
        assert_eq!(outcome.level, NotificationLevel::Error);
        assert_eq!(outcome.message, "Analysis completed with errors: a, b");
    }

    #[test]
    fn test_email_sent_is_success() {
        let outcome = classify_outcome(&response(Some(vec![]), Some("true")), "u@x.com");
        assert_eq!(outcome.level, NotificationLevel::Success);
        assert_eq!(outcome.message, "Report sent to u@x.com.");
    }

    #[test]
    fn test_no_email_is_info() {
        let outcome = classify_outcome(&response(None, Some("false")), "u@x.com");
        assert_eq!(outcome.level, NotificationLevel::Info);
        assert_eq!(outcome.message, NO_EMAIL);
    }

    #[test]
    fn test_validate_run() {
        assert_eq!(
            validate_run(&[], "u@x.com"),
            Err(ValidationError::EmptyWatchlist)
        );
        assert_eq!(
            validate_run(&[" ".to_string()], "u@x.com"),
            Err(ValidationError::EmptyWatchlist)
        );
        assert_eq!(
            validate_run(&["AAPL".to_string()], "  "),
            Err(ValidationError::MissingRecipient)
        );
        assert!(validate_run(&["AAPL".to_string()], "u@x.com").is_ok());
    }

    #[test]
    fn test_normalize_ticker() {
        assert_eq!(normalize_ticker("  aapl "), Some("AAPL".to_string()));
        assert_eq!(normalize_ticker("   "), None);
    }
}
