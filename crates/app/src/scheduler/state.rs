//! Scheduler state — armed timers and in-flight job runs.
//!
//! Owned by exactly one [`ExecutionScheduler`](super::ExecutionScheduler).
//! Nothing here is global: two schedulers in one process never share state.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use leadflow_domain::id::JobId;
use tokio::task::AbortHandle;

/// Timer handles and reentrancy bookkeeping for recurring jobs.
#[derive(Debug, Default)]
pub struct SchedulerState {
    timers: Mutex<HashMap<JobId, AbortHandle>>,
    running: Arc<Mutex<HashSet<JobId>>>,
}

impl SchedulerState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the timer of `job_id`, aborting the one it replaces.
    pub fn register_timer(&self, job_id: JobId, timer: AbortHandle) {
        let previous = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id, timer);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Abort the timer of `job_id`. Returns whether one was armed.
    pub fn cancel_timer(&self, job_id: JobId) -> bool {
        let timer = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&job_id);
        let Some(timer) = timer else {
            return false;
        };
        timer.abort();
        true
    }

    /// Abort every timer. Returns how many were armed.
    pub fn cancel_all(&self) -> usize {
        let timers: Vec<_> = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        for (_, timer) in &timers {
            timer.abort();
        }
        timers.len()
    }

    /// Whether `job_id` has a live timer.
    pub fn is_scheduled(&self, job_id: JobId) -> bool {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&job_id)
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Number of live timers.
    pub fn scheduled_count(&self) -> usize {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|timer| !timer.is_finished())
            .count()
    }

    /// Mark `job_id` as running, unless it already is.
    ///
    /// The returned guard clears the mark when dropped, whichever way the
    /// run ends.
    pub fn try_claim(&self, job_id: JobId) -> Option<RunGuard> {
        let inserted = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id);
        inserted.then(|| RunGuard {
            job_id,
            running: Arc::clone(&self.running),
        })
    }

    /// Whether a run of `job_id` is in flight.
    pub fn is_running(&self, job_id: JobId) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&job_id)
    }
}

/// Proof that this process owns the current run of a job.
#[derive(Debug)]
#[must_use = "the claim is released as soon as the guard is dropped"]
pub struct RunGuard {
    job_id: JobId,
    running: Arc<Mutex<HashSet<JobId>>>,
}

impl RunGuard {
    #[must_use]
    pub fn job_id(&self) -> JobId {
        self.job_id
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.job_id);
    }
}
