//! Execution scheduler — cron timers and guarded runs of recurring jobs.
//!
//! Every armed job owns one timer task. The task computes the next cron
//! occurrence in the job's time zone, sleeps until it and spawns a run, so a
//! slow handler never delays the following tick. Runs of one job never
//! overlap inside a process: a tick that finds the previous run still going
//! is dropped.
//!
//! A failed run counts against the job's retry budget; once the budget is
//! spent the job is deactivated and its timer torn down until the job is
//! reactivated from outside. A handler that panics counts as a failed run.
//!
//! Detached runs are tracked so shutdown can wait for them.

mod state;

pub use state::{RunGuard, SchedulerState};

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use chrono_tz::Tz;
use leadflow_domain::error::{LeadflowError, NotFoundError, ValidationError};
use leadflow_domain::id::{JobId, TenantId};
use leadflow_domain::job::{CronSchedule, JobOutcome, RecurringJob, RecurringJobExecution};
use leadflow_domain::time::{self, Timestamp};
use tokio::task::JoinSet;

use crate::dispatcher::panic_reason;
use crate::ports::{Clock, ExecutionStore, JobRepository};

/// Does the actual work of a job run.
pub trait JobRunner: Send + Sync {
    fn run(
        &self,
        job: RecurringJob,
        now: Timestamp,
    ) -> impl Future<Output = Result<JobOutcome, LeadflowError>> + Send;
}

impl<T: JobRunner> JobRunner for Arc<T> {
    fn run(
        &self,
        job: RecurringJob,
        now: Timestamp,
    ) -> impl Future<Output = Result<JobOutcome, LeadflowError>> + Send {
        (**self).run(job, now)
    }
}

/// Arms and disarms job timers on behalf of management use cases.
pub trait JobTimers: Send + Sync {
    /// Install (or replace) the timer of `job`, returning its next fire time.
    fn arm(
        &self,
        job: RecurringJob,
    ) -> impl Future<Output = Result<Option<Timestamp>, LeadflowError>> + Send;

    /// Tear down the timer of `job_id`. Returns whether one was armed.
    fn disarm(&self, job_id: JobId) -> bool;
}

/// Tunables of an [`ExecutionScheduler`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerOptions {
    /// Abort handlers running past their job's timeout instead of only
    /// logging the overrun.
    pub enforce_timeouts: bool,
}

enum RunFailure {
    Failed(LeadflowError),
    Panicked(String),
    TimedOut,
}

/// Drives recurring jobs from their cron schedules.
pub struct ExecutionScheduler<J, E, H, C> {
    jobs: J,
    executions: E,
    runner: Arc<H>,
    clock: C,
    state: SchedulerState,
    options: SchedulerOptions,
    runs: Mutex<JoinSet<()>>,
}

impl<J, E, H, C> ExecutionScheduler<J, E, H, C>
where
    J: JobRepository + Send + Sync + 'static,
    E: ExecutionStore + Send + Sync + 'static,
    H: JobRunner + 'static,
    C: Clock + 'static,
{
    /// Create a scheduler owning `state`.
    pub fn new(
        jobs: J,
        executions: E,
        runner: H,
        clock: C,
        state: SchedulerState,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            jobs,
            executions,
            runner: Arc::new(runner),
            clock,
            state,
            options,
            runs: Mutex::new(JoinSet::new()),
        }
    }

    /// Timers and in-flight runs of this scheduler.
    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Arm (or re-arm) the timer of `job` and persist its next fire time.
    ///
    /// # Errors
    ///
    /// Returns [`LeadflowError::Validation`] for an inactive job or a
    /// malformed schedule, and storage errors from persisting `next_run_at`.
    #[tracing::instrument(skip(self, job), fields(job_id = %job.id, tenant_id = %job.tenant_id))]
    pub async fn schedule_job(
        self: &Arc<Self>,
        job: &RecurringJob,
    ) -> Result<Option<Timestamp>, LeadflowError> {
        if !job.active {
            return Err(ValidationError::InactiveJob(job.id.to_string()).into());
        }
        let cron = job.cron()?;
        let next_run_at = cron.next_after(self.clock.now(), job.timezone);
        self.jobs
            .set_next_run(job.tenant_id, job.id, next_run_at)
            .await?;

        let timer = tokio::spawn(timer_loop(
            Arc::downgrade(self),
            job.tenant_id,
            job.id,
            cron,
            job.timezone,
        ));
        self.state.register_timer(job.id, timer.abort_handle());

        tracing::info!(schedule = %job.schedule, next_run_at = ?next_run_at, "job scheduled");
        Ok(next_run_at)
    }

    /// Arm every active job of every tenant. A job that cannot be armed is
    /// logged and left out.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the active jobs cannot be listed.
    pub async fn schedule_all(self: &Arc<Self>) -> Result<usize, LeadflowError> {
        let jobs = self.jobs.find_all_active().await?;
        let mut armed = 0;
        for job in &jobs {
            match self.schedule_job(job).await {
                Ok(_) => armed += 1,
                Err(err) => tracing::warn!(job_id = %job.id, error = %err, "job not scheduled"),
            }
        }
        Ok(armed)
    }

    /// Tear down the timer of `job_id`. A run already in flight finishes.
    pub fn cancel_job(&self, job_id: JobId) -> bool {
        self.state.cancel_timer(job_id)
    }

    /// Tear down every timer. Runs already in flight keep going; see
    /// [`wait_idle`](Self::wait_idle).
    pub fn stop_all(&self) -> usize {
        let stopped = self.state.cancel_all();
        tracing::info!(stopped, "all job timers stopped");
        stopped
    }

    /// Number of detached runs not yet reaped.
    pub fn in_flight(&self) -> usize {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Wait until every detached run, including ones started while
    /// waiting, has finished.
    pub async fn wait_idle(&self) {
        loop {
            let mut batch =
                std::mem::take(&mut *self.runs.lock().unwrap_or_else(PoisonError::into_inner));
            if batch.is_empty() {
                return;
            }
            while batch.join_next().await.is_some() {}
        }
    }

    /// Start a run of `job_id` outside its schedule. The run happens in the
    /// background and is tracked like a scheduled one.
    ///
    /// # Errors
    ///
    /// Returns [`LeadflowError::NotFound`] when the job does not exist for
    /// `tenant_id`.
    pub async fn trigger_now(
        self: &Arc<Self>,
        tenant_id: TenantId,
        job_id: JobId,
    ) -> Result<(), LeadflowError> {
        if self.jobs.get_by_id(tenant_id, job_id).await?.is_none() {
            return Err(NotFoundError {
                entity: "RecurringJob",
                id: job_id.to_string(),
            }
            .into());
        }
        self.spawn_run(tenant_id, job_id);
        Ok(())
    }

    fn spawn_run(self: &Arc<Self>, tenant_id: TenantId, job_id: JobId) {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        while runs.try_join_next().is_some() {}
        runs.spawn(Arc::clone(self).run_detached(tenant_id, job_id));
    }

    /// Run `job_id` once, now, unless a run of it is already in flight.
    ///
    /// Returns `None` when the tick was dropped: the job is running, missing
    /// or inactive.
    ///
    /// # Errors
    ///
    /// Returns storage errors raised while recording the run. Handler
    /// failures are not errors here; they are recorded on the run and the job.
    #[tracing::instrument(skip(self))]
    pub async fn execute_job(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
    ) -> Result<Option<RecurringJobExecution>, LeadflowError> {
        let Some(_guard) = self.state.try_claim(job_id) else {
            tracing::debug!("previous run still in flight, tick dropped");
            return Ok(None);
        };
        let Some(job) = self.jobs.get_by_id(tenant_id, job_id).await? else {
            tracing::debug!("job vanished, tick dropped");
            return Ok(None);
        };
        if !job.active {
            tracing::debug!("job inactive, tick dropped");
            return Ok(None);
        }

        let started = self.clock.now();
        let mut run = self
            .executions
            .create_job_run(RecurringJobExecution::start(tenant_id, job_id, started))
            .await?;

        let outcome = self.invoke(&job, started).await;
        let finished = self.clock.now();
        let next_run_at = job
            .cron()
            .ok()
            .and_then(|cron| cron.next_after(finished, job.timezone));

        match outcome {
            Ok(outcome) => {
                run.complete(finished, outcome);
                let run = self.executions.update_job_run(run).await?;
                if !self.options.enforce_timeouts
                    && run.duration_ms.unwrap_or_default() > job.timeout_secs.saturating_mul(1000)
                {
                    tracing::warn!(timeout_secs = job.timeout_secs, "job overran its timeout");
                }
                self.jobs
                    .record_success(tenant_id, job_id, finished, next_run_at)
                    .await?;
                tracing::info!(
                    processed = run.processed_items,
                    affected = run.affected_items,
                    duration_ms = run.duration_ms,
                    "job run completed"
                );
                Ok(Some(run))
            }
            Err(failure) => {
                match failure {
                    RunFailure::Failed(err) => run.fail(finished, err.to_string()),
                    RunFailure::Panicked(reason) => run.fail(finished, reason),
                    RunFailure::TimedOut => run.time_out(finished, job.timeout_secs),
                }
                let message = run.error_message.clone().unwrap_or_default();
                let run = self.executions.update_job_run(run).await?;
                let job = self
                    .jobs
                    .record_failure(tenant_id, job_id, finished, message, next_run_at)
                    .await?;
                tracing::warn!(
                    status = %run.status,
                    retry_count = job.retry_count,
                    max_retries = job.max_retries,
                    error = run.error_message.as_deref().unwrap_or_default(),
                    "job run failed"
                );
                if !job.active {
                    self.state.cancel_timer(job_id);
                    tracing::error!("retry budget spent, job deactivated");
                }
                Ok(Some(run))
            }
        }
    }

    /// Run the handler on its own task so a panic ends up as a failed run.
    async fn invoke(&self, job: &RecurringJob, now: Timestamp) -> Result<JobOutcome, RunFailure> {
        let runner = Arc::clone(&self.runner);
        let owned = job.clone();
        let mut work = tokio::spawn(async move { runner.run(owned, now).await });
        let joined = if self.options.enforce_timeouts {
            match tokio::time::timeout(Duration::from_secs(job.timeout_secs), &mut work).await {
                Ok(joined) => joined,
                Err(_) => {
                    work.abort();
                    return Err(RunFailure::TimedOut);
                }
            }
        } else {
            work.await
        };
        match joined {
            Ok(result) => result.map_err(RunFailure::Failed),
            Err(err) => Err(RunFailure::Panicked(format!("job handler {}", panic_reason(err)))),
        }
    }

    async fn run_detached(self: Arc<Self>, tenant_id: TenantId, job_id: JobId) {
        if let Err(err) = self.execute_job(tenant_id, job_id).await {
            tracing::error!(%job_id, error = %err, "job run could not be recorded");
        }
    }
}

async fn timer_loop<J, E, H, C>(
    scheduler: Weak<ExecutionScheduler<J, E, H, C>>,
    tenant_id: TenantId,
    job_id: JobId,
    cron: CronSchedule,
    timezone: Tz,
) where
    J: JobRepository + Send + Sync + 'static,
    E: ExecutionStore + Send + Sync + 'static,
    H: JobRunner + 'static,
    C: Clock + 'static,
{
    let mut last_fire: Option<Timestamp> = None;
    loop {
        let Some(this) = scheduler.upgrade() else {
            return;
        };
        let now = this.clock.now();
        // Never fire the same occurrence twice if the clock lags the timer.
        let from = last_fire.map_or(now, |fired| fired.max(now));
        let Some(next) = cron.next_after(from, timezone) else {
            tracing::info!(%job_id, "schedule has no further occurrence");
            return;
        };
        drop(this);

        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;
        last_fire = Some(next);

        let Some(this) = scheduler.upgrade() else {
            return;
        };
        tracing::debug!(%job_id, fire_at = %next, lag_ms = time::elapsed_ms(next, this.clock.now()), "job tick");
        this.spawn_run(tenant_id, job_id);
    }
}

impl<J, E, H, C> JobTimers for Arc<ExecutionScheduler<J, E, H, C>>
where
    J: JobRepository + Send + Sync + 'static,
    E: ExecutionStore + Send + Sync + 'static,
    H: JobRunner + 'static,
    C: Clock + 'static,
{
    fn arm(
        &self,
        job: RecurringJob,
    ) -> impl Future<Output = Result<Option<Timestamp>, LeadflowError>> + Send {
        let scheduler = Arc::clone(self);
        async move { scheduler.schedule_job(&job).await }
    }

    fn disarm(&self, job_id: JobId) -> bool {
        self.cancel_job(job_id)
    }
}
