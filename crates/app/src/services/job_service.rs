//! Job service — use-cases for managing recurring jobs.
//!
//! Every change that affects whether a job should fire is mirrored on its
//! timer through [`JobTimers`].

use leadflow_domain::error::{LeadflowError, NotFoundError};
use leadflow_domain::id::{JobId, TenantId};
use leadflow_domain::job::{RecurringJob, RecurringJobExecution};

use crate::ports::{ExecutionStore, JobRepository};
use crate::scheduler::JobTimers;

/// Application service for tenant-scoped job management.
pub struct JobService<J, E, T> {
    repo: J,
    executions: E,
    timers: T,
}

impl<J, E, T> JobService<J, E, T>
where
    J: JobRepository,
    E: ExecutionStore,
    T: JobTimers,
{
    /// Create a new service.
    pub fn new(repo: J, executions: E, timers: T) -> Self {
        Self {
            repo,
            executions,
            timers,
        }
    }

    /// Create a job and, if active, arm its timer.
    ///
    /// # Errors
    ///
    /// Returns [`LeadflowError::Validation`] for a malformed schedule or kind
    /// config, or a storage error from the repository.
    #[tracing::instrument(skip(self, job), fields(tenant_id = %job.tenant_id, job_name = %job.name))]
    pub async fn create_job(&self, job: RecurringJob) -> Result<RecurringJob, LeadflowError> {
        job.validate()?;
        let job = self.repo.create(job).await?;
        self.sync_timer(job).await
    }

    /// Look up a job by id.
    ///
    /// # Errors
    ///
    /// Returns [`LeadflowError::NotFound`] when no job with `id` exists for
    /// `tenant_id`, or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_job(&self, tenant_id: TenantId, id: JobId) -> Result<RecurringJob, LeadflowError> {
        self.repo.get_by_id(tenant_id, id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "RecurringJob",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all jobs of a tenant.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_jobs(&self, tenant_id: TenantId) -> Result<Vec<RecurringJob>, LeadflowError> {
        self.repo.list(tenant_id).await
    }

    /// Replace a job's definition and re-arm or disarm its timer.
    ///
    /// # Errors
    ///
    /// Returns [`LeadflowError::Validation`] if invariants fail, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self, job), fields(tenant_id = %job.tenant_id, job_id = %job.id))]
    pub async fn update_job(&self, job: RecurringJob) -> Result<RecurringJob, LeadflowError> {
        job.validate()?;
        let job = self.repo.update(job).await?;
        self.sync_timer(job).await
    }

    /// Switch a job on or off. Switching on clears the retry counter.
    ///
    /// # Errors
    ///
    /// Returns [`LeadflowError::NotFound`] for an unknown job, or a storage
    /// error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn set_active(
        &self,
        tenant_id: TenantId,
        id: JobId,
        active: bool,
    ) -> Result<RecurringJob, LeadflowError> {
        let job = self.repo.set_active(tenant_id, id, active).await?;
        self.sync_timer(job).await
    }

    /// Close the circuit breaker of a job switched off by repeated failures:
    /// active again, retry counter and last error cleared, timer re-armed.
    ///
    /// # Errors
    ///
    /// Returns [`LeadflowError::NotFound`] for an unknown job, or a storage
    /// error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn reactivate(&self, tenant_id: TenantId, id: JobId) -> Result<RecurringJob, LeadflowError> {
        let mut job = self.get_job(tenant_id, id).await?;
        job.reactivate();
        let job = self.repo.update(job).await?;
        tracing::info!("job reactivated");
        self.sync_timer(job).await
    }

    /// Delete a job and tear down its timer.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete_job(&self, tenant_id: TenantId, id: JobId) -> Result<(), LeadflowError> {
        self.repo.delete(tenant_id, id).await?;
        self.timers.disarm(id);
        Ok(())
    }

    /// Most recent runs of a job.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the store.
    pub async fn list_runs(
        &self,
        tenant_id: TenantId,
        id: JobId,
        limit: u32,
    ) -> Result<Vec<RecurringJobExecution>, LeadflowError> {
        self.executions.list_job_runs(tenant_id, id, limit).await
    }

    async fn sync_timer(&self, mut job: RecurringJob) -> Result<RecurringJob, LeadflowError> {
        if job.active {
            job.next_run_at = self.timers.arm(job.clone()).await?;
        } else {
            self.timers.disarm(job.id);
        }
        Ok(job)
    }
}
