//! Execution store port — the audit trail of rule and job runs.
//!
//! Automation executions are claimed with compare-and-set operations so
//! that at most one worker ever moves a given record out of `pending`.

use std::future::Future;
use std::sync::Arc;

use leadflow_domain::automation::{AutomationExecution, ExecutionStatus};
use leadflow_domain::error::LeadflowError;
use leadflow_domain::id::{ExecutionId, JobId, RuleId, TenantId};
use leadflow_domain::job::RecurringJobExecution;
use leadflow_domain::time::Timestamp;

/// Per-status counts of a tenant's automation executions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    pub pending: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl ExecutionStats {
    /// Add `count` executions in `status`.
    pub fn add(&mut self, status: ExecutionStatus, count: u64) {
        let slot = match status {
            ExecutionStatus::Pending => &mut self.pending,
            ExecutionStatus::Running => &mut self.running,
            ExecutionStatus::Completed => &mut self.completed,
            ExecutionStatus::Failed => &mut self.failed,
            ExecutionStatus::Skipped => &mut self.skipped,
        };
        *slot += count;
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.pending + self.running + self.completed + self.failed + self.skipped
    }
}

/// Rows removed by a retention purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub automation: u64,
    pub jobs: u64,
}

impl PurgeReport {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.automation + self.jobs
    }
}

/// Storage for [`AutomationExecution`]s and [`RecurringJobExecution`]s.
pub trait ExecutionStore {
    /// Persist a new automation execution.
    fn create_automation(
        &self,
        execution: AutomationExecution,
    ) -> impl Future<Output = Result<AutomationExecution, LeadflowError>> + Send;

    /// Get an automation execution of `tenant_id`.
    fn get_automation(
        &self,
        tenant_id: TenantId,
        id: ExecutionId,
    ) -> impl Future<Output = Result<Option<AutomationExecution>, LeadflowError>> + Send;

    /// Move a `pending` execution to `running` and stamp `executed_at`.
    ///
    /// Returns `false` when the record was not `pending` anymore.
    fn claim_automation(
        &self,
        tenant_id: TenantId,
        id: ExecutionId,
        at: Timestamp,
    ) -> impl Future<Output = Result<bool, LeadflowError>> + Send;

    /// Move a `pending` execution to `skipped`.
    ///
    /// Returns `false` when the record was not `pending` anymore.
    fn skip_automation(
        &self,
        tenant_id: TenantId,
        id: ExecutionId,
        at: Timestamp,
    ) -> impl Future<Output = Result<bool, LeadflowError>> + Send;

    /// Write progress of a `running` execution, including its final status.
    ///
    /// Fails with [`LeadflowError::NotFound`] when no running record matches.
    fn update_automation(
        &self,
        execution: AutomationExecution,
    ) -> impl Future<Output = Result<AutomationExecution, LeadflowError>> + Send;

    /// Pending executions due at `now`, oldest `scheduled_for` first, across
    /// every tenant.
    fn find_due_automations(
        &self,
        now: Timestamp,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<AutomationExecution>, LeadflowError>> + Send;

    /// A tenant's executions, newest first, optionally for one rule.
    fn list_automations(
        &self,
        tenant_id: TenantId,
        rule_id: Option<RuleId>,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<AutomationExecution>, LeadflowError>> + Send;

    /// Count a tenant's executions per status.
    fn automation_stats(
        &self,
        tenant_id: TenantId,
    ) -> impl Future<Output = Result<ExecutionStats, LeadflowError>> + Send;

    /// Persist a new job run.
    fn create_job_run(
        &self,
        run: RecurringJobExecution,
    ) -> impl Future<Output = Result<RecurringJobExecution, LeadflowError>> + Send;

    /// Write the outcome of a job run.
    fn update_job_run(
        &self,
        run: RecurringJobExecution,
    ) -> impl Future<Output = Result<RecurringJobExecution, LeadflowError>> + Send;

    /// A job's runs, newest first.
    fn list_job_runs(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<RecurringJobExecution>, LeadflowError>> + Send;

    /// Delete a tenant's finished executions of both kinds whose
    /// `finished_at` is before `cutoff`. Rows still `pending` or `running`
    /// are never touched.
    fn purge_finished_before(
        &self,
        tenant_id: TenantId,
        cutoff: Timestamp,
    ) -> impl Future<Output = Result<PurgeReport, LeadflowError>> + Send;
}

impl<T: ExecutionStore + Send + Sync> ExecutionStore for Arc<T> {
    fn create_automation(
        &self,
        execution: AutomationExecution,
    ) -> impl Future<Output = Result<AutomationExecution, LeadflowError>> + Send {
        (**self).create_automation(execution)
    }

    fn get_automation(
        &self,
        tenant_id: TenantId,
        id: ExecutionId,
    ) -> impl Future<Output = Result<Option<AutomationExecution>, LeadflowError>> + Send {
        (**self).get_automation(tenant_id, id)
    }

    fn claim_automation(
        &self,
        tenant_id: TenantId,
        id: ExecutionId,
        at: Timestamp,
    ) -> impl Future<Output = Result<bool, LeadflowError>> + Send {
        (**self).claim_automation(tenant_id, id, at)
    }

    fn skip_automation(
        &self,
        tenant_id: TenantId,
        id: ExecutionId,
        at: Timestamp,
    ) -> impl Future<Output = Result<bool, LeadflowError>> + Send {
        (**self).skip_automation(tenant_id, id, at)
    }

    fn update_automation(
        &self,
        execution: AutomationExecution,
    ) -> impl Future<Output = Result<AutomationExecution, LeadflowError>> + Send {
        (**self).update_automation(execution)
    }

    fn find_due_automations(
        &self,
        now: Timestamp,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<AutomationExecution>, LeadflowError>> + Send {
        (**self).find_due_automations(now, limit)
    }

    fn list_automations(
        &self,
        tenant_id: TenantId,
        rule_id: Option<RuleId>,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<AutomationExecution>, LeadflowError>> + Send {
        (**self).list_automations(tenant_id, rule_id, limit)
    }

    fn automation_stats(
        &self,
        tenant_id: TenantId,
    ) -> impl Future<Output = Result<ExecutionStats, LeadflowError>> + Send {
        (**self).automation_stats(tenant_id)
    }

    fn create_job_run(
        &self,
        run: RecurringJobExecution,
    ) -> impl Future<Output = Result<RecurringJobExecution, LeadflowError>> + Send {
        (**self).create_job_run(run)
    }

    fn update_job_run(
        &self,
        run: RecurringJobExecution,
    ) -> impl Future<Output = Result<RecurringJobExecution, LeadflowError>> + Send {
        (**self).update_job_run(run)
    }

    fn list_job_runs(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<RecurringJobExecution>, LeadflowError>> + Send {
        (**self).list_job_runs(tenant_id, job_id, limit)
    }

    fn purge_finished_before(
        &self,
        tenant_id: TenantId,
        cutoff: Timestamp,
    ) -> impl Future<Output = Result<PurgeReport, LeadflowError>> + Send {
        (**self).purge_finished_before(tenant_id, cutoff)
    }
}
