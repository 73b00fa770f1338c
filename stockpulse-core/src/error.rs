//! Error types for StockPulse operations

use thiserror::Error;

/// Input rejected locally before any backend round-trip.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Add at least one stock ticker to your watchlist before running analysis.")]
    EmptyWatchlist,

    #[error("Please set a delivery email address in Settings before running analysis.")]
    MissingRecipient,
}

/// Failures reported by the scheduler or the agent-invocation service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The request never produced a usable response (connect, timeout, TLS).
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The backend answered but did not report `success: true`.
    #[error("{0}")]
    Rejected(String),

    /// The response could not be decoded into the expected shape.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl BackendError {
    /// Message suitable for inline display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Errors from schedule operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Schedule not found: {schedule_id}")]
    NotFound { schedule_id: String },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ScheduleError {
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { .. } => self.to_string(),
            Self::Backend(err) => err.user_message(),
        }
    }
}

/// Live event channel failures. History is kept; no reconnect is attempted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("Failed to open event stream for session {session_id}: {reason}")]
    Connect { session_id: String, reason: String },

    #[error("Event stream transport error: {0}")]
    Transport(String),

    #[error("Event stream closed: {0}")]
    Closed(String),
}

/// Key-value store failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store IO error: {0}")]
    Io(String),

    #[error("Corrupt value under key {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Master error type for all StockPulse errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PulseError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for StockPulse operations.
pub type PulseResult<T> = Result<T, PulseError>;
