//! StockPulse Events - live agent activity
//!
//! Consumes the real-time, session-scoped event stream that reports an AI
//! agent's progress while a run executes.
//!
//! # Key Types
//!
//! - `ActivityState`: rolling per-session state (connected, processing, active
//!   agent, ordered event log, thinking narration)
//! - `AgentActivity`: attach/detach consumer enforcing a single live session
//! - `EventSource`: transport seam that opens a channel for a session id
//! - `ChannelEventSource`: in-process source for tests and embedders

mod channel;
mod consumer;
mod state;

pub use channel::{ChannelEventSource, Publisher};
pub use consumer::{ActivityUpdate, AgentActivity, EventSource, EventStream};
pub use state::ActivityState;

// Re-export event types for convenience
pub use stockpulse_core::{AgentEvent, StatusEvent, StreamError, ThinkingEvent};
