//! The request/response contract with the remote scheduler.

use async_trait::async_trait;
use stockpulse_core::{ExecutionLog, Schedule, ScheduleError, ScheduleFilter};

/// Remote scheduler operations.
///
/// `pause`/`resume` are idempotent on the backend: pausing a paused schedule
/// succeeds. Acknowledgements carry no schedule state; callers re-read.
#[async_trait]
pub trait ScheduleApi: Send + Sync {
    async fn list(&self, filter: &ScheduleFilter) -> Result<Vec<Schedule>, ScheduleError>;

    async fn get(&self, schedule_id: &str) -> Result<Schedule, ScheduleError>;

    async fn pause(&self, schedule_id: &str) -> Result<(), ScheduleError>;

    async fn resume(&self, schedule_id: &str) -> Result<(), ScheduleError>;

    /// Most-recent-first, at most `limit` entries.
    async fn logs(&self, schedule_id: &str, limit: usize)
        -> Result<Vec<ExecutionLog>, ScheduleError>;
}
