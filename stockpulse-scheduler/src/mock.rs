// ============================================================================
// MOCK SCHEDULER
// ============================================================================

use crate::api::ScheduleApi;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use stockpulse_core::{
    recent_window, BackendError, ExecutionLog, Schedule, ScheduleError, ScheduleFilter,
};

/// Operations a failure can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduleOp {
    List,
    Get,
    Pause,
    Resume,
    Logs,
}

/// A request as the mock received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleCall {
    List { agent_id: Option<String> },
    Get { schedule_id: String },
    Pause { schedule_id: String },
    Resume { schedule_id: String },
    Logs { schedule_id: String, limit: usize },
}

#[derive(Debug, Clone)]
struct Injected {
    error: BackendError,
    /// Apply the mutation, then report the error anyway.
    after_apply: bool,
}

/// In-memory scheduler backend for testing.
///
/// Pause and resume are idempotent and only flip `is_active`.
#[derive(Debug, Default, Clone)]
pub struct MockScheduler {
    schedules: Arc<RwLock<Vec<Schedule>>>,
    executions: Arc<RwLock<HashMap<String, Vec<ExecutionLog>>>>,
    failures: Arc<RwLock<HashMap<ScheduleOp, Injected>>>,
    hidden: Arc<RwLock<HashSet<String>>>,
    calls: Arc<RwLock<Vec<ScheduleCall>>>,
}

impl MockScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schedules(schedules: impl IntoIterator<Item = Schedule>) -> Self {
        let mock = Self::new();
        for schedule in schedules {
            mock.insert(schedule);
        }
        mock
    }

    /// Insert or replace by id.
    pub fn insert(&self, schedule: Schedule) {
        let mut schedules = write(&self.schedules);
        match schedules.iter_mut().find(|s| s.id == schedule.id) {
            Some(existing) => *existing = schedule,
            None => schedules.push(schedule),
        }
    }

    /// Current backend copy of a schedule.
    pub fn schedule(&self, schedule_id: &str) -> Option<Schedule> {
        read(&self.schedules)
            .iter()
            .find(|s| s.id == schedule_id)
            .cloned()
    }

    pub fn set_executions(&self, schedule_id: &str, logs: Vec<ExecutionLog>) {
        write(&self.executions).insert(schedule_id.to_string(), logs);
    }

    /// Fail every subsequent `op` with `error`.
    pub fn fail(&self, op: ScheduleOp, error: BackendError) {
        write(&self.failures).insert(
            op,
            Injected {
                error,
                after_apply: false,
            },
        );
    }

    /// Apply `op`, then report `error`, as when a response is lost in transit.
    pub fn fail_after_apply(&self, op: ScheduleOp, error: BackendError) {
        write(&self.failures).insert(
            op,
            Injected {
                error,
                after_apply: true,
            },
        );
    }

    pub fn recover(&self, op: ScheduleOp) {
        write(&self.failures).remove(&op);
    }

    /// Leave a schedule out of list results.
    pub fn hide_from_list(&self, schedule_id: &str) {
        write(&self.hidden).insert(schedule_id.to_string());
    }

    pub fn calls(&self) -> Vec<ScheduleCall> {
        read(&self.calls).clone()
    }

    /// Number of pause/resume requests received.
    pub fn mutation_count(&self) -> usize {
        read(&self.calls)
            .iter()
            .filter(|c| matches!(c, ScheduleCall::Pause { .. } | ScheduleCall::Resume { .. }))
            .count()
    }

    fn record(&self, call: ScheduleCall) {
        write(&self.calls).push(call);
    }

    fn injected(&self, op: ScheduleOp) -> Option<Injected> {
        read(&self.failures).get(&op).cloned()
    }

    fn set_active(&self, op: ScheduleOp, schedule_id: &str, active: bool) -> Result<(), ScheduleError> {
        let injected = self.injected(op);
        if let Some(Injected {
            error,
            after_apply: false,
        }) = injected
        {
            return Err(error.into());
        }

        {
            let mut schedules = write(&self.schedules);
            let schedule = schedules
                .iter_mut()
                .find(|s| s.id == schedule_id)
                .ok_or_else(|| not_found(schedule_id))?;
            schedule.is_active = active;
        }

        match injected {
            Some(Injected { error, .. }) => Err(error.into()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ScheduleApi for MockScheduler {
    async fn list(&self, filter: &ScheduleFilter) -> Result<Vec<Schedule>, ScheduleError> {
        self.record(ScheduleCall::List {
            agent_id: filter.agent_id.clone(),
        });
        if let Some(injected) = self.injected(ScheduleOp::List) {
            return Err(injected.error.into());
        }
        let hidden = read(&self.hidden);
        Ok(read(&self.schedules)
            .iter()
            .filter(|s| filter.matches(s) && !hidden.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn get(&self, schedule_id: &str) -> Result<Schedule, ScheduleError> {
        self.record(ScheduleCall::Get {
            schedule_id: schedule_id.to_string(),
        });
        if let Some(injected) = self.injected(ScheduleOp::Get) {
            return Err(injected.error.into());
        }
        self.schedule(schedule_id)
            .ok_or_else(|| not_found(schedule_id))
    }

    async fn pause(&self, schedule_id: &str) -> Result<(), ScheduleError> {
        self.record(ScheduleCall::Pause {
            schedule_id: schedule_id.to_string(),
        });
        self.set_active(ScheduleOp::Pause, schedule_id, false)
    }

    async fn resume(&self, schedule_id: &str) -> Result<(), ScheduleError> {
        self.record(ScheduleCall::Resume {
            schedule_id: schedule_id.to_string(),
        });
        self.set_active(ScheduleOp::Resume, schedule_id, true)
    }

    async fn logs(
        &self,
        schedule_id: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionLog>, ScheduleError> {
        self.record(ScheduleCall::Logs {
            schedule_id: schedule_id.to_string(),
            limit,
        });
        if let Some(injected) = self.injected(ScheduleOp::Logs) {
            return Err(injected.error.into());
        }
        let logs = read(&self.executions)
            .get(schedule_id)
            .cloned()
            .unwrap_or_default();
        Ok(recent_window(logs, limit))
    }
}

fn not_found(schedule_id: &str) -> ScheduleError {
    ScheduleError::NotFound {
        schedule_id: schedule_id.to_string(),
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
