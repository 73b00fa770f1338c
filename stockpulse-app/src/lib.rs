//! StockPulse client
//!
//! Wires the schedule controller and the live activity consumer behind the
//! [`Dashboard`] facade, with HTTP, WebSocket and file-backed collaborators
//! configured from TOML.

pub mod api_client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod persistence;
pub mod realtime;
pub mod telemetry;

pub use api_client::AgentClient;
pub use config::{AgentProfile, AuthConfig, ConfigError, LogFormat, PulseConfig};
pub use dashboard::{
    classify_outcome, normalize_ticker, run_prompt, Dashboard, DashboardSettings, DashboardState,
    RunOutcome, DEFAULT_TIMEZONE,
};
pub use error::AppError;
pub use persistence::JsonFileStore;
pub use realtime::WsEventSource;
pub use telemetry::init_tracing;
