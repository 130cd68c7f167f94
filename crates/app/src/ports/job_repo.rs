//! Job repository port — persistence for recurring jobs.
//!
//! The `record_*` operations are read-modify-write updates that must be
//! atomic with respect to concurrent callers on the same job.

use std::future::Future;
use std::sync::Arc;

use leadflow_domain::error::LeadflowError;
use leadflow_domain::id::{JobId, TenantId};
use leadflow_domain::job::RecurringJob;
use leadflow_domain::time::Timestamp;

/// Repository for persisting and querying [`RecurringJob`]s.
pub trait JobRepository {
    /// Create a new job in storage.
    fn create(
        &self,
        job: RecurringJob,
    ) -> impl Future<Output = Result<RecurringJob, LeadflowError>> + Send;

    /// Get a job of `tenant_id` by its identifier.
    fn get_by_id(
        &self,
        tenant_id: TenantId,
        id: JobId,
    ) -> impl Future<Output = Result<Option<RecurringJob>, LeadflowError>> + Send;

    /// Get all jobs of a tenant.
    fn list(
        &self,
        tenant_id: TenantId,
    ) -> impl Future<Output = Result<Vec<RecurringJob>, LeadflowError>> + Send;

    /// Active jobs across every tenant, used to arm timers at startup.
    fn find_all_active(
        &self,
    ) -> impl Future<Output = Result<Vec<RecurringJob>, LeadflowError>> + Send;

    /// Replace an existing job's definition.
    fn update(
        &self,
        job: RecurringJob,
    ) -> impl Future<Output = Result<RecurringJob, LeadflowError>> + Send;

    /// Delete a job.
    fn delete(
        &self,
        tenant_id: TenantId,
        id: JobId,
    ) -> impl Future<Output = Result<(), LeadflowError>> + Send;

    /// Apply a successful run and return the updated job.
    fn record_success(
        &self,
        tenant_id: TenantId,
        id: JobId,
        at: Timestamp,
        next_run_at: Option<Timestamp>,
    ) -> impl Future<Output = Result<RecurringJob, LeadflowError>> + Send;

    /// Apply a failed run, tripping the circuit breaker when the retry
    /// budget is spent, and return the updated job.
    fn record_failure(
        &self,
        tenant_id: TenantId,
        id: JobId,
        at: Timestamp,
        message: String,
        next_run_at: Option<Timestamp>,
    ) -> impl Future<Output = Result<RecurringJob, LeadflowError>> + Send;

    /// Store the next planned fire time.
    fn set_next_run(
        &self,
        tenant_id: TenantId,
        id: JobId,
        next_run_at: Option<Timestamp>,
    ) -> impl Future<Output = Result<(), LeadflowError>> + Send;

    /// Switch a job on or off. Switching on also clears the retry counter.
    fn set_active(
        &self,
        tenant_id: TenantId,
        id: JobId,
        active: bool,
    ) -> impl Future<Output = Result<RecurringJob, LeadflowError>> + Send;
}

impl<T: JobRepository + Send + Sync> JobRepository for Arc<T> {
    fn create(
        &self,
        job: RecurringJob,
    ) -> impl Future<Output = Result<RecurringJob, LeadflowError>> + Send {
        (**self).create(job)
    }

    fn get_by_id(
        &self,
        tenant_id: TenantId,
        id: JobId,
    ) -> impl Future<Output = Result<Option<RecurringJob>, LeadflowError>> + Send {
        (**self).get_by_id(tenant_id, id)
    }

    fn list(
        &self,
        tenant_id: TenantId,
    ) -> impl Future<Output = Result<Vec<RecurringJob>, LeadflowError>> + Send {
        (**self).list(tenant_id)
    }

    fn find_all_active(
        &self,
    ) -> impl Future<Output = Result<Vec<RecurringJob>, LeadflowError>> + Send {
        (**self).find_all_active()
    }

    fn update(
        &self,
        job: RecurringJob,
    ) -> impl Future<Output = Result<RecurringJob, LeadflowError>> + Send {
        (**self).update(job)
    }

    fn delete(
        &self,
        tenant_id: TenantId,
        id: JobId,
    ) -> impl Future<Output = Result<(), LeadflowError>> + Send {
        (**self).delete(tenant_id, id)
    }

    fn record_success(
        &self,
        tenant_id: TenantId,
        id: JobId,
        at: Timestamp,
        next_run_at: Option<Timestamp>,
    ) -> impl Future<Output = Result<RecurringJob, LeadflowError>> + Send {
        (**self).record_success(tenant_id, id, at, next_run_at)
    }

    fn record_failure(
        &self,
        tenant_id: TenantId,
        id: JobId,
        at: Timestamp,
        message: String,
        next_run_at: Option<Timestamp>,
    ) -> impl Future<Output = Result<RecurringJob, LeadflowError>> + Send {
        (**self).record_failure(tenant_id, id, at, message, next_run_at)
    }

    fn set_next_run(
        &self,
        tenant_id: TenantId,
        id: JobId,
        next_run_at: Option<Timestamp>,
    ) -> impl Future<Output = Result<(), LeadflowError>> + Send {
        (**self).set_next_run(tenant_id, id, next_run_at)
    }

    fn set_active(
        &self,
        tenant_id: TenantId,
        id: JobId,
        active: bool,
    ) -> impl Future<Output = Result<RecurringJob, LeadflowError>> + Send {
        (**self).set_active(tenant_id, id, active)
    }
}
