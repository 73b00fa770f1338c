//! Behavioural tests for the live activity consumer.

use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use stockpulse_events::{
    ActivityState, ActivityUpdate, AgentActivity, AgentEvent, ChannelEventSource, StreamError,
};
use tokio::sync::broadcast;

async fn wait_for<F>(rx: &mut broadcast::Receiver<ActivityUpdate>, predicate: F) -> ActivityUpdate
where
    F: Fn(&ActivityUpdate) -> bool,
{
    loop {
        let update = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for activity update")
            .expect("update channel closed");
        if predicate(&update) {
            return update;
        }
    }
}

fn setup() -> (Arc<ChannelEventSource>, AgentActivity) {
    let source = Arc::new(ChannelEventSource::new());
    let activity = AgentActivity::new(source.clone());
    (source, activity)
}

#[tokio::test]
async fn events_apply_in_arrival_order() {
    let (source, activity) = setup();
    let mut rx = activity.subscribe();
    let publisher = source.publisher("sess-1");

    activity.attach(Some("sess-1"));
    wait_for(&mut rx, |u| matches!(u, ActivityUpdate::Connected { .. })).await;

    let script = vec![
        AgentEvent::status("A", Some("Coordinator"), true),
        AgentEvent::thinking("A", "step 1"),
        AgentEvent::thinking("A", "step 2"),
        AgentEvent::status("A", Some("Coordinator"), false),
    ];
    for event in &script {
        publisher.send(Ok(event.clone())).unwrap();
    }

    let mut observed = Vec::new();
    while observed.len() < script.len() {
        if let ActivityUpdate::Event { event, .. } =
            wait_for(&mut rx, |u| matches!(u, ActivityUpdate::Event { .. })).await
        {
            observed.push(event);
        }
    }
    assert_eq!(observed, script);

    let state = activity.snapshot();
    assert!(state.connected);
    assert_eq!(state.thinking_messages(), vec!["step 1", "step 2"]);
    assert_eq!(state.last_thinking_message.as_deref(), Some("step 2"));
    assert!(!state.processing);
    assert_eq!(state.active_agent_name.as_deref(), Some("Coordinator"));
}

#[tokio::test]
async fn switching_sessions_discards_stale_events() {
    let (source, activity) = setup();
    let mut rx = activity.subscribe();
    let old = source.publisher("old");
    let new = source.publisher("new");

    activity.attach(Some("old"));
    wait_for(&mut rx, |u| matches!(u, ActivityUpdate::Connected { .. })).await;
    old.send(Ok(AgentEvent::thinking("A", "from old"))).unwrap();
    wait_for(&mut rx, |u| matches!(u, ActivityUpdate::Event { .. })).await;

    activity.attach(Some("new"));
    let state = activity.snapshot();
    assert!(state.events.is_empty());
    assert_eq!(state.session_id.as_deref(), Some("new"));

    // The old channel may still accept sends; nothing it carries may land.
    let _ = old.send(Ok(AgentEvent::thinking("A", "late from old")));
    new.send(Ok(AgentEvent::thinking("B", "from new"))).unwrap();
    let update = wait_for(&mut rx, |u| matches!(u, ActivityUpdate::Event { .. })).await;
    assert!(matches!(update, ActivityUpdate::Event { ref session_id, .. } if session_id == "new"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    let state = activity.snapshot();
    assert_eq!(state.thinking_messages(), vec!["from new"]);
}

#[tokio::test]
async fn closed_channel_keeps_history() {
    let (source, activity) = setup();
    let mut rx = activity.subscribe();
    let publisher = source.publisher("sess-1");

    activity.attach(Some("sess-1"));
    publisher
        .send(Ok(AgentEvent::thinking("A", "finished thought")))
        .unwrap();
    wait_for(&mut rx, |u| matches!(u, ActivityUpdate::Event { .. })).await;

    drop(publisher);
    source.close("sess-1");
    wait_for(&mut rx, |u| matches!(u, ActivityUpdate::Disconnected { .. })).await;

    let state = activity.snapshot();
    assert!(!state.connected);
    assert_eq!(state.thinking_messages(), vec!["finished thought"]);
    assert_eq!(state.session_id.as_deref(), Some("sess-1"));
}

#[tokio::test]
async fn transport_error_flips_connected_without_clearing() {
    let (source, activity) = setup();
    let mut rx = activity.subscribe();
    let publisher = source.publisher("sess-1");

    activity.attach(Some("sess-1"));
    publisher.send(Ok(AgentEvent::status("A", None, true))).unwrap();
    publisher
        .send(Err(StreamError::Transport("connection reset".to_string())))
        .unwrap();

    let update = wait_for(&mut rx, |u| matches!(u, ActivityUpdate::Disconnected { .. })).await;
    assert!(matches!(
        update,
        ActivityUpdate::Disconnected { reason: Some(ref r), .. } if r.contains("connection reset")
    ));
    let state = activity.snapshot();
    assert!(!state.connected);
    assert_eq!(state.events.len(), 1);
}

#[tokio::test]
async fn refused_open_reports_disconnect() {
    let (source, activity) = setup();
    let mut rx = activity.subscribe();
    source.refuse("sess-1");

    activity.attach(Some("sess-1"));
    wait_for(&mut rx, |u| matches!(u, ActivityUpdate::Disconnected { .. })).await;
    assert!(!activity.snapshot().connected);
}

#[tokio::test]
async fn detach_clears_session_but_keeps_external_processing() {
    let (source, activity) = setup();
    let mut rx = activity.subscribe();
    let publisher = source.publisher("sess-1");

    activity.set_processing(true);
    activity.attach(Some("sess-1"));
    publisher.send(Ok(AgentEvent::thinking("A", "hmm"))).unwrap();
    wait_for(&mut rx, |u| matches!(u, ActivityUpdate::Event { .. })).await;

    activity.detach();
    let state = activity.snapshot();
    assert!(state.session_id.is_none());
    assert!(state.events.is_empty());
    assert!(state.thinking_events.is_empty());
    assert!(state.last_thinking_message.is_none());
    assert!(state.active_agent_id.is_none());
    assert!(state.processing);

    activity.set_processing(false);
    assert!(!activity.is_processing());
}

#[tokio::test]
async fn reattaching_current_session_is_noop() {
    let (source, activity) = setup();
    let mut rx = activity.subscribe();
    let publisher = source.publisher("sess-1");

    activity.attach(Some("sess-1"));
    publisher.send(Ok(AgentEvent::thinking("A", "kept"))).unwrap();
    wait_for(&mut rx, |u| matches!(u, ActivityUpdate::Event { .. })).await;

    activity.attach(Some("sess-1"));
    assert_eq!(activity.snapshot().thinking_messages(), vec!["kept"]);
    assert_eq!(source.opened(), vec!["sess-1".to_string()]);
}

#[tokio::test]
async fn status_frame_without_processing_keeps_run_busy() {
    let (source, activity) = setup();
    let mut rx = activity.subscribe();
    let publisher = source.publisher("sess-1");

    activity.set_processing(true);
    activity.attach(Some("sess-1"));
    let frame = AgentEvent::decode(r#"{"kind":"status","agentId":"B"}"#).unwrap();
    publisher.send(Ok(frame)).unwrap();
    wait_for(&mut rx, |u| matches!(u, ActivityUpdate::Event { .. })).await;

    let state = activity.snapshot();
    assert!(state.processing);
    assert_eq!(state.active_agent_id.as_deref(), Some("B"));
}

fn arb_event() -> impl Strategy<Value = AgentEvent> {
    prop_oneof![
        ("[A-C]", any::<bool>()).prop_map(|(agent, busy)| AgentEvent::status(agent, None, busy)),
        ("[A-C]", "[a-z ]{0,12}").prop_map(|(agent, text)| AgentEvent::thinking(agent, text)),
    ]
}

proptest! {
    #[test]
    fn reducer_preserves_arrival_order(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = ActivityState::new();
        for event in &events {
            state.apply(event.clone());
        }

        prop_assert_eq!(&state.events, &events);

        let thoughts: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::Thinking(t) => Some(t.message.as_str()),
                AgentEvent::Status(_) => None,
            })
            .collect();
        prop_assert_eq!(state.thinking_messages(), thoughts.clone());
        prop_assert_eq!(state.last_thinking_message.as_deref(), thoughts.last().copied());

        let last_status = events.iter().rev().find_map(|e| match e {
            AgentEvent::Status(s) => s.processing,
            AgentEvent::Thinking(_) => None,
        });
        prop_assert_eq!(state.processing, last_status.unwrap_or(false));
    }
}
