//! Session-scoped live activity consumer.
//!
//! ## Architecture
//!
//! - At most one session is live. `attach` bumps a generation counter and
//!   aborts the previous pump task while holding the state lock, so a torn-down
//!   channel can never mutate state again, even if its transport closes later.
//! - The pump applies events one at a time under the same lock and publishes an
//!   `ActivityUpdate` before releasing it, so observers see arrival order.
//! - The pump only holds a `Weak` reference; dropping the last
//!   `AgentActivity` aborts it.

use crate::state::ActivityState;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use stockpulse_core::{AgentEvent, StreamError};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Stream of decoded events for one session.
pub type EventStream = BoxStream<'static, Result<AgentEvent, StreamError>>;

/// Opens a live event channel scoped to a session id.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn open(&self, session_id: &str) -> Result<EventStream, StreamError>;
}

/// Change notifications published to observers, in the order state changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityUpdate {
    Attached { session_id: Option<String> },
    Connected { session_id: String },
    Event { session_id: String, event: AgentEvent },
    Disconnected { session_id: String, reason: Option<String> },
    Processing(bool),
}

struct Inner {
    generation: u64,
    state: ActivityState,
    task: Option<JoinHandle<()>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Consumer of the live agent event stream.
#[derive(Clone)]
pub struct AgentActivity {
    source: Arc<dyn EventSource>,
    inner: Arc<Mutex<Inner>>,
    updates: broadcast::Sender<ActivityUpdate>,
}

impl AgentActivity {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self::with_capacity(source, 256)
    }

    /// `capacity` bounds how far a slow observer may lag before missing updates.
    pub fn with_capacity(source: Arc<dyn EventSource>, capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(capacity.max(1));
        Self {
            source,
            inner: Arc::new(Mutex::new(Inner {
                generation: 0,
                state: ActivityState::new(),
                task: None,
            })),
            updates,
        }
    }

    /// Switch the live session.
    ///
    /// `None` detaches. Either way the previous channel stops mutating state
    /// before this returns. Re-attaching the current session is a no-op.
    /// Must be called from within a Tokio runtime when `session_id` is `Some`.
    pub fn attach(&self, session_id: Option<&str>) {
        let mut inner = self.lock();
        if session_id.is_some() && inner.state.session_id.as_deref() == session_id {
            return;
        }

        inner.generation += 1;
        if let Some(task) = inner.task.take() {
            task.abort();
        }
        let previous = inner.state.session_id.take();
        inner.state.reset_session(session_id.map(str::to_string));
        let _ = self.updates.send(ActivityUpdate::Attached {
            session_id: session_id.map(str::to_string),
        });

        match session_id {
            Some(id) => {
                info!(session_id = %id, previous = ?previous, "Attaching agent event stream");
                let pump = Pump {
                    source: self.source.clone(),
                    inner: Arc::downgrade(&self.inner),
                    updates: self.updates.clone(),
                    session_id: id.to_string(),
                    generation: inner.generation,
                };
                inner.task = Some(tokio::spawn(pump.run()));
            }
            None => {
                debug!(previous = ?previous, "Detached agent event stream");
            }
        }
    }

    pub fn detach(&self) {
        self.attach(None);
    }

    /// Mark a run as in progress (or finished) independent of stream status.
    pub fn set_processing(&self, processing: bool) {
        let mut inner = self.lock();
        inner.state.set_processing(processing);
        let _ = self.updates.send(ActivityUpdate::Processing(processing));
    }

    pub fn snapshot(&self) -> ActivityState {
        self.lock().state.clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.lock().state.session_id.clone()
    }

    pub fn is_processing(&self) -> bool {
        self.lock().state.processing
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActivityUpdate> {
        self.updates.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Background task feeding one session's channel into shared state.
struct Pump {
    source: Arc<dyn EventSource>,
    inner: Weak<Mutex<Inner>>,
    updates: broadcast::Sender<ActivityUpdate>,
    session_id: String,
    generation: u64,
}

impl Pump {
    async fn run(self) {
        let mut stream = match self.source.open(&self.session_id).await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(session_id = %self.session_id, error = %err, "Event stream failed to open");
                self.disconnect(Some(err.to_string()));
                return;
            }
        };

        let connected = self.apply(|state, session_id| {
            state.connected = true;
            Some(ActivityUpdate::Connected { session_id })
        });
        if !connected {
            return;
        }

        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    let live = self.apply(|state, session_id| {
                        if state.apply(event.clone()) {
                            Some(ActivityUpdate::Event { session_id, event })
                        } else {
                            debug!(session_id = %session_id, "Dropped duplicate agent event");
                            None
                        }
                    });
                    if !live {
                        return;
                    }
                }
                Err(err) => {
                    warn!(session_id = %self.session_id, error = %err, "Event stream failed");
                    self.disconnect(Some(err.to_string()));
                    return;
                }
            }
        }

        debug!(session_id = %self.session_id, "Event stream closed by server");
        self.disconnect(None);
    }

    fn disconnect(&self, reason: Option<String>) {
        self.apply(|state, session_id| {
            state.connected = false;
            Some(ActivityUpdate::Disconnected { session_id, reason })
        });
    }

    /// Mutate state only if this pump still owns the live session.
    fn apply<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut ActivityState, String) -> Option<ActivityUpdate>,
    {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        let mut guard = inner.lock().unwrap_or_else(|e| e.into_inner());
        if guard.generation != self.generation {
            debug!(session_id = %self.session_id, "Discarding event from stale session");
            return false;
        }
        if let Some(update) = f(&mut guard.state, self.session_id.clone()) {
            let _ = self.updates.send(update);
        }
        true
    }
}
