//! StockPulse Scheduler
//!
//! Client and view-model for the backend-owned recurring job that runs the
//! portfolio analysis. The scheduler service owns the schedule; this crate
//! reads it, pauses and resumes it, and shows its execution history.

pub mod api;
pub mod client;
pub mod controller;
pub mod mock;

pub use api::ScheduleApi;
pub use client::{build_auth_headers, endpoint, parse_base_url, ScheduleClient};
pub use controller::{ScheduleController, ScheduleState};
pub use mock::{MockScheduler, ScheduleCall, ScheduleOp};
