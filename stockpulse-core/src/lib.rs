//! StockPulse Core - shared vocabulary
//!
//! Data model for schedules, execution history, live agent events and
//! delivered reports, plus the error taxonomy, cron phrasing, and the traits
//! for external collaborators (agent invocation, key-value storage).

use chrono::{DateTime, Utc};

pub mod cron;
pub mod error;
pub mod event;
pub mod notifications;
pub mod report;
pub mod schedule;
pub mod store;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use cron::cron_to_human;
pub use error::{
    BackendError, PulseError, PulseResult, ScheduleError, StoreError, StreamError,
    ValidationError,
};
pub use event::{AgentEvent, StatusEvent, ThinkingEvent};
pub use notifications::{Notification, NotificationLevel};
pub use report::{AgentInvoker, InvocationPayload, InvocationResponse, ManagerResponse, StoredReport};
pub use schedule::{recent_window, ExecutionLog, Schedule, ScheduleFilter};
pub use store::{KeyValueStore, MemoryStore};
