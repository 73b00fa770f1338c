//! Schedule view-model: load, inspect history, pause and resume.
//!
//! The backend is authoritative. A toggle never flips `is_active` locally;
//! after the pause/resume request settles the controller re-lists the
//! owning agent's schedules and adopts whatever the backend reports.

use crate::api::ScheduleApi;
use std::sync::{Arc, Mutex, MutexGuard};
use stockpulse_core::{ExecutionLog, Notification, Schedule, ScheduleFilter};
use tracing::{debug, info, warn};

const LOAD_FAILED: &str = "Failed to load schedule";
const NOT_LOADED: &str = "Schedule is not loaded";
const TOGGLE_IN_FLIGHT: &str = "A schedule change is already in progress";

/// Lifecycle of the held schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleState {
    Unloaded,
    Loading {
        last_known: Option<Schedule>,
    },
    Loaded(Schedule),
    /// The last read failed; the previous copy, if any, stays visible.
    LoadFailed {
        error: String,
        last_known: Option<Schedule>,
    },
}

impl ScheduleState {
    /// Whatever copy is displayable right now.
    pub fn schedule(&self) -> Option<&Schedule> {
        match self {
            Self::Unloaded => None,
            Self::Loaded(schedule) => Some(schedule),
            Self::Loading { last_known } | Self::LoadFailed { last_known, .. } => {
                last_known.as_ref()
            }
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::LoadFailed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }
}

struct Inner {
    state: ScheduleState,
    logs: Vec<ExecutionLog>,
    toggle_pending: bool,
    last_message: Option<Notification>,
}

/// Clears `toggle_pending` when the owning future finishes or is dropped.
struct PendingGuard(Arc<Mutex<Inner>>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).toggle_pending = false;
    }
}

/// Shared handle over one tracked schedule.
///
/// Clones observe the same state, so a view can read `state()` or
/// `toggle_pending()` while another clone awaits the backend. No lock is held
/// across an await.
#[derive(Clone)]
pub struct ScheduleController {
    api: Arc<dyn ScheduleApi>,
    schedule_id: String,
    /// Owning agent; used for the reconciling re-list until a schedule names one.
    agent_id: String,
    inner: Arc<Mutex<Inner>>,
}

impl ScheduleController {
    pub fn new(
        api: Arc<dyn ScheduleApi>,
        schedule_id: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            api,
            schedule_id: schedule_id.into(),
            agent_id: agent_id.into(),
            inner: Arc::new(Mutex::new(Inner {
                state: ScheduleState::Unloaded,
                logs: Vec::new(),
                toggle_pending: false,
                last_message: None,
            })),
        }
    }

    pub fn schedule_id(&self) -> &str {
        &self.schedule_id
    }

    pub fn state(&self) -> ScheduleState {
        self.lock().state.clone()
    }

    pub fn schedule(&self) -> Option<Schedule> {
        self.lock().state.schedule().cloned()
    }

    pub fn logs(&self) -> Vec<ExecutionLog> {
        self.lock().logs.clone()
    }

    pub fn toggle_pending(&self) -> bool {
        self.lock().toggle_pending
    }

    pub fn last_message(&self) -> Option<Notification> {
        self.lock().last_message.clone()
    }

    /// Read the schedule from the backend.
    pub async fn load(&self) -> ScheduleState {
        let last_known = {
            let mut inner = self.lock();
            let last_known = inner.state.schedule().cloned();
            inner.state = ScheduleState::Loading {
                last_known: last_known.clone(),
            };
            last_known
        };

        let state = match self.api.get(&self.schedule_id).await {
            Ok(schedule) => {
                debug!(schedule_id = %schedule.id, active = schedule.is_active, "Schedule loaded");
                ScheduleState::Loaded(schedule)
            }
            Err(err) => {
                warn!(schedule_id = %self.schedule_id, error = %err, "Schedule load failed");
                let message = err.user_message();
                ScheduleState::LoadFailed {
                    error: if message.is_empty() {
                        LOAD_FAILED.to_string()
                    } else {
                        message
                    },
                    last_known,
                }
            }
        };
        self.lock().state = state.clone();
        state
    }

    /// Fetch the most recent `limit` executions. On failure the previous
    /// list is kept.
    pub async fn refresh_logs(&self, limit: usize) -> Vec<ExecutionLog> {
        match self.api.logs(&self.schedule_id, limit).await {
            Ok(logs) => {
                self.lock().logs = logs.clone();
                logs
            }
            Err(err) => {
                warn!(schedule_id = %self.schedule_id, error = %err, "Execution history refresh failed");
                self.logs()
            }
        }
    }

    /// Pause an active schedule or resume a paused one.
    ///
    /// Whatever the mutation's outcome, the schedule is then re-read from the
    /// backend's list so the local copy never drifts from it. A second toggle
    /// while one is in flight is refused.
    pub async fn toggle(&self) -> Notification {
        let (current, _pending) = {
            let mut inner = self.lock();
            let current = match &inner.state {
                ScheduleState::Loaded(current) => current.clone(),
                _ => {
                    let notification = Notification::error(NOT_LOADED);
                    inner.last_message = Some(notification.clone());
                    return notification;
                }
            };
            if inner.toggle_pending {
                return Notification::error(TOGGLE_IN_FLIGHT);
            }
            inner.toggle_pending = true;
            inner.last_message = None;
            (current, PendingGuard(Arc::clone(&self.inner)))
        };
        let agent_id = if current.agent_id.is_empty() {
            self.agent_id.as_str()
        } else {
            current.agent_id.as_str()
        };

        let (result, done, fallback) = if current.is_active {
            (
                self.api.pause(&current.id).await,
                "Schedule paused successfully",
                "Failed to pause schedule",
            )
        } else {
            (
                self.api.resume(&current.id).await,
                "Schedule resumed successfully",
                "Failed to resume schedule",
            )
        };

        let notification = match result {
            Ok(()) => {
                info!(schedule_id = %current.id, paused = current.is_active, "Schedule toggled");
                Notification::success(done)
            }
            Err(err) => {
                warn!(schedule_id = %current.id, error = %err, "Schedule toggle failed");
                let message = err.user_message();
                Notification::error(if message.is_empty() {
                    fallback.to_string()
                } else {
                    message
                })
            }
        };

        let refreshed = reconcile(self.api.as_ref(), agent_id, &current.id).await;

        let mut inner = self.lock();
        if let Some(schedule) = refreshed {
            inner.state = ScheduleState::Loaded(schedule);
        }
        inner.last_message = Some(notification.clone());
        notification
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Re-list the agent's schedules and pick ours out; `None` keeps the held copy.
async fn reconcile(api: &dyn ScheduleApi, agent_id: &str, schedule_id: &str) -> Option<Schedule> {
    match api.list(&ScheduleFilter::for_agent(agent_id)).await {
        Ok(schedules) => {
            let found = schedules.into_iter().find(|s| s.id == schedule_id);
            if found.is_none() {
                warn!(schedule_id, agent_id, "Schedule missing from refreshed list");
            }
            found
        }
        Err(err) => {
            warn!(schedule_id, error = %err, "Schedule refresh after toggle failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(active: bool) -> Schedule {
        Schedule {
            id: "S1".to_string(),
            agent_id: "A1".to_string(),
            is_active: active,
            cron_expression: "0 7 * * *".to_string(),
            timezone: "America/New_York".to_string(),
            next_run_time: None,
            last_run_at: None,
        }
    }

    #[test]
    fn test_state_keeps_last_known_copy() {
        let failed = ScheduleState::LoadFailed {
            error: "boom".to_string(),
            last_known: Some(schedule(true)),
        };
        assert_eq!(failed.schedule().map(|s| s.id.as_str()), Some("S1"));
        assert_eq!(failed.error(), Some("boom"));
        assert!(ScheduleState::Unloaded.schedule().is_none());
        assert!(ScheduleState::Loading { last_known: None }.is_loading());
    }

    #[test]
    fn test_pending_guard_clears_on_drop() {
        let controller = ScheduleController::new(Arc::new(crate::MockScheduler::new()), "S1", "A1");
        controller.lock().toggle_pending = true;
        drop(PendingGuard(Arc::clone(&controller.inner)));
        assert!(!controller.toggle_pending());
    }
}
