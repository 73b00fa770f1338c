//! Rolling per-session activity state and the reducer that applies events.

use stockpulse_core::{AgentEvent, ThinkingEvent};
use std::collections::HashSet;

/// Who last decided the `processing` flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum ProcessingSource {
    #[default]
    Stream,
    External,
}

/// Live view of one session's agent activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityState {
    pub session_id: Option<String>,
    pub connected: bool,
    pub processing: bool,
    pub active_agent_id: Option<String>,
    pub active_agent_name: Option<String>,
    /// Every applied event, in arrival order.
    pub events: Vec<AgentEvent>,
    pub thinking_events: Vec<ThinkingEvent>,
    pub last_thinking_message: Option<String>,
    processing_source: ProcessingSource,
    seen_ids: HashSet<String>,
}

impl ActivityState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event. Returns false when it was a duplicate and dropped.
    pub fn apply(&mut self, event: AgentEvent) -> bool {
        if let Some(id) = event.id() {
            if !self.seen_ids.insert(id.to_string()) {
                return false;
            }
        }

        match &event {
            AgentEvent::Status(status) => {
                self.active_agent_id = Some(status.agent_id.clone());
                self.active_agent_name = status.agent_name.clone();
                if let Some(processing) = status.processing {
                    self.processing = processing;
                    self.processing_source = ProcessingSource::Stream;
                }
            }
            AgentEvent::Thinking(thinking) => {
                self.thinking_events.push(thinking.clone());
                self.last_thinking_message = Some(thinking.message.clone());
            }
        }
        self.events.push(event);
        true
    }

    /// External override, e.g. "a run is in progress" before any event arrives.
    pub fn set_processing(&mut self, processing: bool) {
        self.processing = processing;
        self.processing_source = ProcessingSource::External;
    }

    /// Drop everything owned by the previous session.
    ///
    /// `processing` survives only when it was set externally.
    pub fn reset_session(&mut self, session_id: Option<String>) {
        self.session_id = session_id;
        self.connected = false;
        self.active_agent_id = None;
        self.active_agent_name = None;
        self.events.clear();
        self.thinking_events.clear();
        self.last_thinking_message = None;
        self.seen_ids.clear();
        if self.processing_source == ProcessingSource::Stream {
            self.processing = false;
        }
    }

    pub fn thinking_messages(&self) -> Vec<&str> {
        self.thinking_events
            .iter()
            .map(|event| event.message.as_str())
            .collect()
    }

    pub fn is_attached(&self) -> bool {
        self.session_id.is_some()
    }
}
