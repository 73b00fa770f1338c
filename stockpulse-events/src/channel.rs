//! In-process event source backed by unbounded channels.
//!
//! Each session gets one channel. Producers obtain a publisher with
//! [`ChannelEventSource::publisher`]; the consumer takes the receiving half on
//! `open`. Used by tests and by embedders that run the agent in-process.

use crate::consumer::{EventSource, EventStream};
use async_trait::async_trait;
use futures_util::StreamExt;
use stockpulse_core::{AgentEvent, StreamError};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

pub type Publisher = mpsc::UnboundedSender<Result<AgentEvent, StreamError>>;
type Receiver = mpsc::UnboundedReceiver<Result<AgentEvent, StreamError>>;

#[derive(Default)]
struct Channels {
    sessions: HashMap<String, (Publisher, Option<Receiver>)>,
    refused: HashSet<String>,
    opened: Vec<String>,
}

#[derive(Default)]
pub struct ChannelEventSource {
    channels: Mutex<Channels>,
}

impl ChannelEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sender for `session_id`, creating the channel on first use.
    pub fn publisher(&self, session_id: &str) -> Publisher {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                let (tx, rx) = mpsc::unbounded_channel();
                (tx, Some(rx))
            })
            .0
            .clone()
    }

    /// End the session's stream once every outstanding publisher is dropped.
    pub fn close(&self, session_id: &str) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.sessions.remove(session_id);
    }

    /// Make `open` fail for this session.
    pub fn refuse(&self, session_id: &str) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.refused.insert(session_id.to_string());
    }

    /// Session ids in the order they were opened.
    pub fn opened(&self) -> Vec<String> {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.opened.clone()
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn open(&self, session_id: &str) -> Result<EventStream, StreamError> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.opened.push(session_id.to_string());
        if channels.refused.contains(session_id) {
            return Err(StreamError::Connect {
                session_id: session_id.to_string(),
                reason: "refused".to_string(),
            });
        }

        let entry = channels
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                let (tx, rx) = mpsc::unbounded_channel();
                (tx, Some(rx))
            });
        let receiver = entry.1.take().ok_or_else(|| StreamError::Connect {
            session_id: session_id.to_string(),
            reason: "session already streaming".to_string(),
        })?;
        Ok(UnboundedReceiverStream::new(receiver).boxed())
    }
}
