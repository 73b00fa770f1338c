//! Facade behaviour with in-memory collaborators.

use proptest::prelude::*;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use stockpulse_app::{Dashboard, DashboardSettings, DEFAULT_TIMEZONE};
use stockpulse_core::store::{load_json, EMAIL_KEY, REPORTS_KEY, TIMEZONE_KEY, WATCHLIST_KEY};
use stockpulse_core::{
    KeyValueStore, NotificationLevel, StoreError, StoredReport, ValidationError,
};
use stockpulse_events::{ActivityUpdate, AgentActivity};
use stockpulse_test_utils::fixtures::{
    emailed_invocation, execution, failed_invocation, invocation_with_result, morning_schedule,
};
use stockpulse_test_utils::generators::arb_raw_ticker;
use stockpulse_test_utils::{
    AgentEvent, ChannelEventSource, MemoryStore, MockAgentInvoker, MockScheduler, ScheduleCall,
};

struct Harness {
    dashboard: Dashboard,
    scheduler: MockScheduler,
    invoker: MockAgentInvoker,
    source: Arc<ChannelEventSource>,
    store: Arc<MemoryStore>,
}

fn settings() -> DashboardSettings {
    DashboardSettings {
        schedule_id: "S1".to_string(),
        manager_agent_id: "mgr".to_string(),
        log_limit: 10,
        roster: HashMap::from([("A1".to_string(), "Stock Analysis Coordinator".to_string())]),
    }
}

fn harness_with_store(invoker: MockAgentInvoker, store: Arc<MemoryStore>) -> Harness {
    let scheduler = MockScheduler::with_schedules([morning_schedule(true)]);
    let source = Arc::new(ChannelEventSource::new());
    let activity = AgentActivity::new(source.clone());
    let invoker = invoker.observing(activity.clone());
    let dashboard = Dashboard::with_activity(
        Arc::new(scheduler.clone()),
        Arc::new(invoker.clone()),
        activity,
        store.clone(),
        settings(),
    );
    Harness {
        dashboard,
        scheduler,
        invoker,
        source,
        store,
    }
}

fn harness(invoker: MockAgentInvoker) -> Harness {
    harness_with_store(invoker, Arc::new(MemoryStore::new()))
}

fn tickers(symbols: &[&str]) -> Vec<String> {
    symbols.iter().map(|s| s.to_string()).collect()
}

fn assert_run_concluded(h: &Harness) {
    let state = h.dashboard.activity().snapshot();
    assert!(!state.processing, "processing left set after run");
    assert!(state.session_id.is_none(), "event stream left attached");
    assert!(state.events.is_empty());
    assert!(state.thinking_events.is_empty());
}

#[tokio::test]
async fn run_now_persists_defaulted_report_and_reports_delivery() {
    let mut h = harness(MockAgentInvoker::responding(emailed_invocation(
        &["AAPL"],
        "user@x.com",
    )));

    let outcome = h
        .dashboard
        .run_now(&tickers(&["AAPL"]), "user@x.com")
        .await
        .unwrap();

    assert_eq!(outcome.notification.level, NotificationLevel::Success);
    assert!(outcome.notification.message.contains("user@x.com"));
    assert_eq!(outcome.session_id.as_deref(), Some("sess-1"));

    let report = outcome.report.unwrap();
    assert_eq!(report.status, "completed");
    assert!(report.errors.is_empty());
    assert_eq!(report.stocks_analyzed, vec!["AAPL".to_string()]);
    assert_eq!(report.email_sent, "true");
    assert!(report.id.starts_with("report-"));

    let stored: Vec<StoredReport> = load_json(&*h.store, REPORTS_KEY).unwrap().unwrap();
    assert_eq!(stored, vec![report.clone()]);
    assert_eq!(h.dashboard.latest_report(), Some(&report));

    let calls = h.invoker.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].agent_id, "mgr");
    assert_eq!(
        calls[0].message,
        "Analyze the following stocks and send the report to user@x.com: AAPL"
    );
    assert_eq!(calls[0].processing, Some(true));

    assert_run_concluded(&h);
}

#[tokio::test]
async fn empty_watchlist_fails_before_any_backend_call() {
    let mut h = harness(MockAgentInvoker::responding(emailed_invocation(&["AAPL"], "u@x.com")));

    let err = h.dashboard.run_now(&[], "user@x.com").await.unwrap_err();

    assert_eq!(err, ValidationError::EmptyWatchlist);
    assert!(h.invoker.calls().is_empty());
    assert!(h.dashboard.notification().unwrap().is_error());
    assert!(!h.dashboard.activity().is_processing());
}

#[tokio::test]
async fn missing_recipient_fails_before_any_backend_call() {
    let mut h = harness(MockAgentInvoker::responding(emailed_invocation(&["AAPL"], "u@x.com")));

    let err = h
        .dashboard
        .run_now(&tickers(&["AAPL"]), " ")
        .await
        .unwrap_err();

    assert_eq!(err, ValidationError::MissingRecipient);
    assert!(h.invoker.calls().is_empty());
}

#[tokio::test]
async fn transport_failure_reports_network_error_and_clears_flags() {
    let mut h = harness(MockAgentInvoker::unreachable("connection refused"));

    let outcome = h
        .dashboard
        .run_now(&tickers(&["AAPL", "MSFT"]), "user@x.com")
        .await
        .unwrap();

    assert_eq!(outcome.notification.level, NotificationLevel::Error);
    assert_eq!(
        outcome.notification.message,
        "Network error. Please check your connection and try again."
    );
    assert!(outcome.report.is_none());
    assert!(h.dashboard.reports().is_empty());
    assert_run_concluded(&h);
}

#[tokio::test]
async fn structured_failure_uses_backend_text_then_fallback() {
    let mut h = harness(MockAgentInvoker::responding(failed_invocation(
        Some("sess-9"),
        Some("Agent quota exceeded"),
    )));
    let outcome = h
        .dashboard
        .run_now(&tickers(&["AAPL"]), "user@x.com")
        .await
        .unwrap();
    assert_eq!(outcome.notification.message, "Agent quota exceeded");
    assert_eq!(outcome.session_id.as_deref(), Some("sess-9"));
    assert!(outcome.report.is_none());
    assert_run_concluded(&h);

    let mut h = harness(MockAgentInvoker::responding(failed_invocation(None, None)));
    let outcome = h
        .dashboard
        .run_now(&tickers(&["AAPL"]), "user@x.com")
        .await
        .unwrap();
    assert_eq!(
        outcome.notification.message,
        "Analysis failed. Please try again."
    );
    assert_run_concluded(&h);
}

#[tokio::test]
async fn agent_errors_are_reported_but_report_is_kept() {
    let mut h = harness(MockAgentInvoker::responding(invocation_with_result(
        "sess-2",
        json!({
            "report_date": "2026-02-18",
            "errors": ["TSLA quote unavailable", "email bounced"],
            "email_sent": "false"
        }),
    )));

    let outcome = h
        .dashboard
        .run_now(&tickers(&["AAPL", "TSLA"]), "user@x.com")
        .await
        .unwrap();

    assert_eq!(outcome.notification.level, NotificationLevel::Error);
    assert_eq!(
        outcome.notification.message,
        "Analysis completed with errors: TSLA quote unavailable, email bounced"
    );
    let report = outcome.report.unwrap();
    assert_eq!(report.date, "2026-02-18");
    assert_eq!(report.stocks_analyzed, tickers(&["AAPL", "TSLA"]));
    assert_eq!(h.dashboard.reports().len(), 1);
}

#[tokio::test]
async fn run_without_email_is_informational() {
    let mut h = harness(MockAgentInvoker::responding(invocation_with_result(
        "sess-3",
        json!({"email_sent": "false", "portfolio_summary": "Flat week."}),
    )));

    let outcome = h
        .dashboard
        .run_now(&tickers(&["AAPL"]), "user@x.com")
        .await
        .unwrap();

    assert_eq!(outcome.notification.level, NotificationLevel::Info);
    assert_eq!(outcome.report.unwrap().portfolio_summary, "Flat week.");
}

#[tokio::test]
async fn newest_report_comes_first() {
    let mut h = harness(MockAgentInvoker::responding(emailed_invocation(&["AAPL"], "u@x.com")));
    let first = h
        .dashboard
        .run_now(&tickers(&["AAPL"]), "u@x.com")
        .await
        .unwrap()
        .report
        .unwrap();
    let second = h
        .dashboard
        .run_now(&tickers(&["AAPL"]), "u@x.com")
        .await
        .unwrap()
        .report
        .unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(h.dashboard.latest_report(), Some(&second));
    assert_eq!(h.dashboard.reports()[1], first);
}

#[tokio::test]
async fn run_watchlist_uses_stored_settings() {
    let mut h = harness(MockAgentInvoker::responding(emailed_invocation(&["NVDA"], "me@x.com")));
    h.dashboard.add_ticker("nvda").unwrap();
    h.dashboard.save_settings("me@x.com", "Europe/London").unwrap();

    h.dashboard.run_watchlist().await.unwrap();

    assert_eq!(
        h.invoker.calls()[0].message,
        "Analyze the following stocks and send the report to me@x.com: NVDA"
    );
}

#[tokio::test]
async fn refresh_and_toggle_drive_the_schedule() {
    let mut h = harness(MockAgentInvoker::unreachable("unused"));
    h.scheduler.set_executions(
        "S1",
        (0..12)
            .map(|day| {
                execution(
                    &format!("e{day}"),
                    morning_schedule(true).last_run_at.unwrap() - chrono::Duration::days(day),
                    day % 3 != 0,
                )
            })
            .collect(),
    );

    h.dashboard.refresh().await;
    assert_eq!(h.dashboard.schedule_phrase().as_deref(), Some("Daily at 7:00 AM"));
    assert_eq!(h.dashboard.execution_logs().len(), 10);
    assert_eq!(h.dashboard.execution_logs()[0].id, "e0");

    let notification = h.dashboard.toggle_schedule().await;
    assert_eq!(notification.message, "Schedule paused successfully");
    assert!(!h.dashboard.schedule().unwrap().is_active);
    assert!(!h.dashboard.toggle_pending());
    assert_eq!(h.dashboard.notification(), Some(&notification));
    assert!(h.scheduler.calls().contains(&ScheduleCall::List {
        agent_id: Some("A1".to_string())
    }));
}

#[tokio::test]
async fn watchlist_and_settings_survive_reload() {
    let store = Arc::new(MemoryStore::new());
    let mut h = harness_with_store(MockAgentInvoker::unreachable("unused"), store.clone());

    assert_eq!(h.dashboard.timezone(), DEFAULT_TIMEZONE);
    assert!(h.dashboard.add_ticker(" aapl ").unwrap());
    assert!(h.dashboard.add_ticker("MSFT").unwrap());
    assert!(!h.dashboard.add_ticker("AAPL").unwrap());
    assert!(!h.dashboard.add_ticker("   ").unwrap());
    assert!(h.dashboard.remove_ticker("msft").unwrap());
    assert!(!h.dashboard.remove_ticker("TSLA").unwrap());
    h.dashboard.save_settings(" me@x.com ", "Asia/Tokyo").unwrap();

    let reloaded = harness_with_store(MockAgentInvoker::unreachable("unused"), store);
    assert_eq!(reloaded.dashboard.watchlist(), &["AAPL".to_string()]);
    assert_eq!(reloaded.dashboard.email(), "me@x.com");
    assert_eq!(reloaded.dashboard.timezone(), "Asia/Tokyo");
}

#[tokio::test]
async fn blank_tickers_never_reach_prompt_or_report() {
    let mut h = harness(MockAgentInvoker::responding(invocation_with_result(
        "sess-1",
        json!({"email_sent": "false"}),
    )));

    let outcome = h
        .dashboard
        .run_now(&tickers(&["aapl", " ", "", "MSFT "]), " user@x.com ")
        .await
        .unwrap();

    assert_eq!(
        h.invoker.calls()[0].message,
        "Analyze the following stocks and send the report to user@x.com: AAPL, MSFT"
    );
    let report = outcome.report.unwrap();
    assert_eq!(report.stocks_analyzed, tickers(&["AAPL", "MSFT"]));
    assert_eq!(report.email_recipient, "user@x.com");
}

#[tokio::test]
async fn unsaved_report_is_surfaced_in_outcome() {
    let mut h = harness(MockAgentInvoker::responding(emailed_invocation(
        &["AAPL"],
        "user@x.com",
    )));
    h.store.refuse_writes(REPORTS_KEY);

    let outcome = h
        .dashboard
        .run_now(&tickers(&["AAPL"]), "user@x.com")
        .await
        .unwrap();

    assert_eq!(outcome.notification.level, NotificationLevel::Error);
    assert!(outcome.notification.message.starts_with("Report sent to user@x.com."));
    assert!(outcome.notification.message.contains("could not be saved"));
    assert!(matches!(outcome.store_error, Some(StoreError::Io(_))));
    assert!(outcome.report.is_some());
    assert!(h.dashboard.reports().is_empty());
    assert!(h.store.get(REPORTS_KEY).unwrap().is_none());
    assert_run_concluded(&h);
}

#[tokio::test]
async fn failed_timezone_write_keeps_previous_settings() {
    let store = Arc::new(MemoryStore::new());
    let mut h = harness_with_store(MockAgentInvoker::unreachable("unused"), store.clone());
    h.dashboard.save_settings("first@x.com", "UTC").unwrap();

    store.refuse_writes(TIMEZONE_KEY);
    let err = h
        .dashboard
        .save_settings("second@x.com", "Asia/Tokyo")
        .unwrap_err();

    assert!(matches!(err, StoreError::Io(_)));
    assert_eq!(h.dashboard.email(), "first@x.com");
    assert_eq!(h.dashboard.timezone(), "UTC");
    assert_eq!(
        load_json::<String>(&*store, EMAIL_KEY).unwrap().as_deref(),
        Some("first@x.com")
    );

    let reloaded = harness_with_store(MockAgentInvoker::unreachable("unused"), store);
    assert_eq!(reloaded.dashboard.email(), "first@x.com");
    assert_eq!(reloaded.dashboard.timezone(), "UTC");
}

#[tokio::test]
async fn failed_watchlist_write_keeps_list_unchanged() {
    let mut h = harness(MockAgentInvoker::unreachable("unused"));
    assert!(h.dashboard.add_ticker("AAPL").unwrap());

    h.store.refuse_writes(WATCHLIST_KEY);
    assert!(h.dashboard.add_ticker("MSFT").is_err());
    assert!(h.dashboard.remove_ticker("AAPL").is_err());
    assert_eq!(h.dashboard.watchlist(), &["AAPL".to_string()]);
}

#[tokio::test]
async fn corrupt_stored_values_fall_back_to_defaults() {
    let store = Arc::new(MemoryStore::new());
    store.set(WATCHLIST_KEY, "{not json").unwrap();
    store.set(TIMEZONE_KEY, "42").unwrap();

    let h = harness_with_store(MockAgentInvoker::unreachable("unused"), store);
    assert!(h.dashboard.watchlist().is_empty());
    assert_eq!(h.dashboard.timezone(), DEFAULT_TIMEZONE);
}

#[tokio::test]
async fn reports_filter_by_inclusive_dates() {
    let store = Arc::new(MemoryStore::new());
    for date in ["2026-02-10", "2026-02-15", "2026-02-20"] {
        let invoker = MockAgentInvoker::responding(invocation_with_result(
            "sess-r",
            json!({"report_date": date, "email_sent": "true"}),
        ));
        let mut h = harness_with_store(invoker, store.clone());
        h.dashboard
            .run_now(&tickers(&["AAPL"]), "u@x.com")
            .await
            .unwrap();
    }
    let h = harness_with_store(MockAgentInvoker::unreachable("unused"), store);

    let dates = |from: Option<&str>, to: Option<&str>| -> Vec<String> {
        h.dashboard
            .reports_between(from, to)
            .into_iter()
            .map(|r| r.date.clone())
            .collect()
    };
    assert_eq!(dates(None, None).len(), 3);
    assert_eq!(dates(Some("2026-02-15"), None), vec!["2026-02-20", "2026-02-15"]);
    assert_eq!(dates(None, Some("2026-02-15")), vec!["2026-02-15", "2026-02-10"]);
    assert_eq!(dates(Some("2026-02-11"), Some("2026-02-19")), vec!["2026-02-15"]);
}

#[tokio::test]
async fn status_without_name_resolves_from_roster() {
    let h = harness(MockAgentInvoker::unreachable("unused"));
    let mut updates = h.dashboard.activity().subscribe();
    let publisher = h.source.publisher("sess-live");

    h.dashboard.activity().attach(Some("sess-live"));
    publisher
        .send(Ok(AgentEvent::status("A1", None, true)))
        .unwrap();

    loop {
        let update = tokio::time::timeout(Duration::from_secs(2), updates.recv())
            .await
            .expect("timed out waiting for status event")
            .expect("update channel closed");
        if matches!(update, ActivityUpdate::Event { .. }) {
            break;
        }
    }
    assert_eq!(
        h.dashboard.active_agent_name().as_deref(),
        Some("Stock Analysis Coordinator")
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn watchlist_stays_normalized_and_unique(raw in proptest::collection::vec(arb_raw_ticker(), 0..20)) {
        let mut h = harness(MockAgentInvoker::unreachable("unused"));
        for ticker in &raw {
            h.dashboard.add_ticker(ticker).unwrap();
        }

        let watchlist = h.dashboard.watchlist();
        for ticker in watchlist {
            prop_assert_eq!(ticker.trim(), ticker.as_str());
            prop_assert_eq!(ticker.to_uppercase(), ticker.clone());
        }
        let mut deduped = watchlist.to_vec();
        deduped.sort();
        deduped.dedup();
        prop_assert_eq!(deduped.len(), watchlist.len());

        let stored: Vec<String> = load_json(&*h.store, WATCHLIST_KEY)
            .unwrap()
            .unwrap_or_default();
        prop_assert_eq!(stored.as_slice(), watchlist);
    }
}
