//! Recurring jobs — schedule-driven units of tenant work.
//!
//! A job pairs a [`JobKind`] with a cron expression evaluated in the job's
//! time zone. Run statistics and the retry counter live on the job itself;
//! once `retry_count` reaches `max_retries` the job switches itself off and
//! stays off until reactivated from outside.

mod execution;
mod kind;
mod schedule;

pub use execution::{JobOutcome, JobRunStatus, RecurringJobExecution};
pub use kind::JobKind;
pub use schedule::{CronSchedule, parse_timezone};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{LeadflowError, ValidationError};
use crate::id::{JobId, TenantId};
use crate::time::{self, Timestamp};

/// Default run budget when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
/// Default number of consecutive failures before the job is switched off.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// A tenant's schedule-driven job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringJob {
    pub id: JobId,
    pub tenant_id: TenantId,
    pub name: String,
    pub kind: JobKind,
    /// Cron expression (5 or 6 fields).
    pub schedule: String,
    pub timezone: Tz,
    pub active: bool,
    pub last_run_at: Option<Timestamp>,
    pub next_run_at: Option<Timestamp>,
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub last_error: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Consecutive failures since the last success.
    pub retry_count: u32,
    pub created_at: Timestamp,
}

impl RecurringJob {
    /// Create a builder for constructing a [`RecurringJob`].
    #[must_use]
    pub fn builder() -> RecurringJobBuilder {
        RecurringJobBuilder::default()
    }

    /// Check domain invariants, including that the schedule parses.
    ///
    /// # Errors
    ///
    /// Returns [`LeadflowError::Validation`] for an empty name, a malformed
    /// schedule, a zero `max_retries` or an invalid kind config.
    pub fn validate(&self) -> Result<(), LeadflowError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.max_retries == 0 {
            return Err(ValidationError::ZeroMaxRetries.into());
        }
        self.kind.validate()?;
        self.cron()?;
        Ok(())
    }

    /// Parse this job's schedule.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidSchedule`] if the stored expression
    /// is malformed.
    pub fn cron(&self) -> Result<CronSchedule, ValidationError> {
        CronSchedule::parse(&self.schedule)
    }

    /// Whether the circuit breaker has tripped.
    #[must_use]
    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// Apply a successful run.
    pub fn record_success(&mut self, at: Timestamp, next_run_at: Option<Timestamp>) {
        self.last_run_at = Some(at);
        self.run_count += 1;
        self.success_count += 1;
        self.retry_count = 0;
        self.next_run_at = next_run_at;
    }

    /// Apply a failed run, tripping the breaker when retries are exhausted.
    pub fn record_failure(
        &mut self,
        at: Timestamp,
        message: impl Into<String>,
        next_run_at: Option<Timestamp>,
    ) {
        self.last_run_at = Some(at);
        self.run_count += 1;
        self.error_count += 1;
        self.retry_count += 1;
        self.last_error = Some(message.into());
        if self.retries_exhausted() {
            self.active = false;
            self.next_run_at = None;
        } else {
            self.next_run_at = next_run_at;
        }
    }

    /// Turn a tripped job back on with a clean retry budget.
    pub fn reactivate(&mut self) {
        self.active = true;
        self.retry_count = 0;
        self.last_error = None;
    }
}

/// Step-by-step builder for [`RecurringJob`].
#[derive(Debug, Default)]
pub struct RecurringJobBuilder {
    id: Option<JobId>,
    tenant_id: Option<TenantId>,
    name: Option<String>,
    kind: Option<JobKind>,
    schedule: Option<String>,
    timezone: Option<Tz>,
    active: Option<bool>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    created_at: Option<Timestamp>,
}

impl RecurringJobBuilder {
    #[must_use]
    pub fn id(mut self, id: JobId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn tenant_id(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: JobKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn schedule(mut self, expression: impl Into<String>) -> Self {
        self.schedule = Some(expression.into());
        self
    }

    #[must_use]
    pub fn timezone(mut self, timezone: Tz) -> Self {
        self.timezone = Some(timezone);
        self
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    #[must_use]
    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    #[must_use]
    pub fn created_at(mut self, ts: Timestamp) -> Self {
        self.created_at = Some(ts);
        self
    }

    /// Consume the builder, validate, and return a [`RecurringJob`].
    ///
    /// # Errors
    ///
    /// Returns [`LeadflowError::Validation`] if the kind is missing or any
    /// invariant fails.
    pub fn build(self) -> Result<RecurringJob, LeadflowError> {
        let kind = self
            .kind
            .ok_or(ValidationError::InvalidJobConfig("job kind is required"))?;
        let job = RecurringJob {
            id: self.id.unwrap_or_default(),
            tenant_id: self.tenant_id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            kind,
            schedule: self.schedule.unwrap_or_default(),
            timezone: self.timezone.unwrap_or(Tz::UTC),
            active: self.active.unwrap_or(true),
            last_run_at: None,
            next_run_at: None,
            run_count: 0,
            success_count: 0,
            error_count: 0,
            last_error: None,
            timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_count: 0,
            created_at: self.created_at.unwrap_or_else(time::now),
        };
        job.validate()?;
        Ok(job)
    }
}
