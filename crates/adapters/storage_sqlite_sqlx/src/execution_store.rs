//! `SQLite` implementation of [`ExecutionStore`].
//!
//! Claiming and skipping are compare-and-set updates guarded by
//! `status = 'pending'`: whichever worker's statement lands first wins and
//! every other one sees zero affected rows.

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use leadflow_app::ports::{ExecutionStats, ExecutionStore, PurgeReport};
use leadflow_domain::automation::{AutomationExecution, ExecutionStatus};
use leadflow_domain::error::LeadflowError;
use leadflow_domain::id::{ExecutionId, JobExecutionId, JobId, LeadId, RuleId, TenantId};
use leadflow_domain::job::{JobRunStatus, RecurringJobExecution};
use leadflow_domain::time::Timestamp;

use crate::error::{db, json};
use crate::row::{self, encode_opt_ts, encode_ts, int, not_found};

struct AutomationRow(AutomationExecution);

impl<'r> FromRow<'r, SqliteRow> for AutomationRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let subject: Option<uuid::Uuid> = row.try_get("subject_id")?;

        Ok(Self(AutomationExecution {
            id: ExecutionId::from_uuid(row.try_get("id")?),
            tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
            rule_id: RuleId::from_uuid(row.try_get("rule_id")?),
            subject_id: subject.map(LeadId::from_uuid),
            trigger_data: row::json(row, "trigger_data")?,
            scheduled_for: row::ts(row, "scheduled_for")?,
            executed_at: row::opt_ts(row, "executed_at")?,
            finished_at: row::opt_ts(row, "finished_at")?,
            status: row::parsed::<ExecutionStatus>(row, "status")?,
            actions_completed: row::small_count(row, "actions_completed")?,
            actions_total: row::small_count(row, "actions_total")?,
            error_message: row.try_get("error_message")?,
            action_results: row::json(row, "action_results")?,
            created_at: row::ts(row, "created_at")?,
        }))
    }
}

struct JobRunRow(RecurringJobExecution);

impl<'r> FromRow<'r, SqliteRow> for JobRunRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let duration_ms: Option<i64> = row.try_get("duration_ms")?;
        let output: Option<String> = row.try_get("output_data")?;
        let output_data = output
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(RecurringJobExecution {
            id: JobExecutionId::from_uuid(row.try_get("id")?),
            tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
            job_id: JobId::from_uuid(row.try_get("job_id")?),
            started_at: row::ts(row, "started_at")?,
            finished_at: row::opt_ts(row, "finished_at")?,
            status: row::parsed::<JobRunStatus>(row, "status")?,
            duration_ms: duration_ms.map(|ms| u64::try_from(ms).unwrap_or(0)),
            processed_items: row::count(row, "processed_items")?,
            affected_items: row::count(row, "affected_items")?,
            error_message: row.try_get("error_message")?,
            output_data,
        }))
    }
}

/// `SQLite`-backed store for automation executions and job runs.
pub struct SqliteExecutionStore {
    pool: SqlitePool,
}

impl SqliteExecutionStore {
    /// Create a new store backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn compare_and_set(
        &self,
        tenant_id: TenantId,
        id: ExecutionId,
        next: ExecutionStatus,
        at: Timestamp,
    ) -> Result<bool, LeadflowError> {
        let column = if next == ExecutionStatus::Running {
            "executed_at"
        } else {
            "finished_at"
        };
        let sql = format!(
            "UPDATE automation_executions SET status = ?, {column} = ? WHERE id = ? AND tenant_id = ? AND status = 'pending'"
        );
        let result = sqlx::query(&sql)
            .bind(next.as_str())
            .bind(encode_ts(at))
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(result.rows_affected() == 1)
    }
}

impl ExecutionStore for SqliteExecutionStore {
    async fn create_automation(
        &self,
        execution: AutomationExecution,
    ) -> Result<AutomationExecution, LeadflowError> {
        let trigger_data = serde_json::to_string(&execution.trigger_data).map_err(json)?;
        let action_results = serde_json::to_string(&execution.action_results).map_err(json)?;

        sqlx::query(
            "INSERT INTO automation_executions (id, tenant_id, rule_id, subject_id, trigger_data, scheduled_for, executed_at, finished_at, status, actions_completed, actions_total, error_message, action_results, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(execution.id.as_uuid())
        .bind(execution.tenant_id.as_uuid())
        .bind(execution.rule_id.as_uuid())
        .bind(execution.subject_id.map(LeadId::as_uuid))
        .bind(&trigger_data)
        .bind(encode_ts(execution.scheduled_for))
        .bind(encode_opt_ts(execution.executed_at))
        .bind(encode_opt_ts(execution.finished_at))
        .bind(execution.status.as_str())
        .bind(i64::from(execution.actions_completed))
        .bind(i64::from(execution.actions_total))
        .bind(&execution.error_message)
        .bind(&action_results)
        .bind(encode_ts(execution.created_at))
        .execute(&self.pool)
        .await
        .map_err(db)?;

        Ok(execution)
    }

    async fn get_automation(
        &self,
        tenant_id: TenantId,
        id: ExecutionId,
    ) -> Result<Option<AutomationExecution>, LeadflowError> {
        let row: Option<AutomationRow> =
            sqlx::query_as("SELECT * FROM automation_executions WHERE id = ? AND tenant_id = ?")
                .bind(id.as_uuid())
                .bind(tenant_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db)?;
        Ok(row.map(|r| r.0))
    }

    async fn claim_automation(
        &self,
        tenant_id: TenantId,
        id: ExecutionId,
        at: Timestamp,
    ) -> Result<bool, LeadflowError> {
        self.compare_and_set(tenant_id, id, ExecutionStatus::Running, at)
            .await
    }

    async fn skip_automation(
        &self,
        tenant_id: TenantId,
        id: ExecutionId,
        at: Timestamp,
    ) -> Result<bool, LeadflowError> {
        self.compare_and_set(tenant_id, id, ExecutionStatus::Skipped, at)
            .await
    }

    async fn update_automation(
        &self,
        execution: AutomationExecution,
    ) -> Result<AutomationExecution, LeadflowError> {
        let action_results = serde_json::to_string(&execution.action_results).map_err(json)?;

        // Only the worker holding the claim may write, and only once.
        let result = sqlx::query(
            "UPDATE automation_executions SET status = ?, finished_at = ?, actions_completed = ?, actions_total = ?, error_message = ?, action_results = ? WHERE id = ? AND tenant_id = ? AND status = 'running'",
        )
        .bind(execution.status.as_str())
        .bind(encode_opt_ts(execution.finished_at))
        .bind(i64::from(execution.actions_completed))
        .bind(i64::from(execution.actions_total))
        .bind(&execution.error_message)
        .bind(&action_results)
        .bind(execution.id.as_uuid())
        .bind(execution.tenant_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(db)?;

        if result.rows_affected() == 0 {
            return Err(not_found("AutomationExecution", execution.id));
        }
        Ok(execution)
    }

    async fn find_due_automations(
        &self,
        now: Timestamp,
        limit: u32,
    ) -> Result<Vec<AutomationExecution>, LeadflowError> {
        let rows: Vec<AutomationRow> = sqlx::query_as(
            "SELECT * FROM automation_executions WHERE status = 'pending' AND scheduled_for <= ? ORDER BY scheduled_for LIMIT ?",
        )
        .bind(encode_ts(now))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn list_automations(
        &self,
        tenant_id: TenantId,
        rule_id: Option<RuleId>,
        limit: u32,
    ) -> Result<Vec<AutomationExecution>, LeadflowError> {
        let rule = rule_id.map(RuleId::as_uuid);
        let rows: Vec<AutomationRow> = sqlx::query_as(
            "SELECT * FROM automation_executions WHERE tenant_id = ? AND (? IS NULL OR rule_id = ?) ORDER BY created_at DESC LIMIT ?",
        )
        .bind(tenant_id.as_uuid())
        .bind(rule)
        .bind(rule)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn automation_stats(&self, tenant_id: TenantId) -> Result<ExecutionStats, LeadflowError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM automation_executions WHERE tenant_id = ? GROUP BY status",
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        let mut stats = ExecutionStats::default();
        for (status, count) in rows {
            let status: ExecutionStatus = status.parse().map_err(json)?;
            stats.add(status, u64::try_from(count).unwrap_or(0));
        }
        Ok(stats)
    }

    async fn create_job_run(
        &self,
        run: RecurringJobExecution,
    ) -> Result<RecurringJobExecution, LeadflowError> {
        let output = run
            .output_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(json)?;

        sqlx::query(
            "INSERT INTO job_executions (id, tenant_id, job_id, started_at, finished_at, status, duration_ms, processed_items, affected_items, error_message, output_data) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(run.id.as_uuid())
        .bind(run.tenant_id.as_uuid())
        .bind(run.job_id.as_uuid())
        .bind(encode_ts(run.started_at))
        .bind(encode_opt_ts(run.finished_at))
        .bind(run.status.as_str())
        .bind(run.duration_ms.map(int))
        .bind(int(run.processed_items))
        .bind(int(run.affected_items))
        .bind(&run.error_message)
        .bind(&output)
        .execute(&self.pool)
        .await
        .map_err(db)?;

        Ok(run)
    }

    async fn update_job_run(
        &self,
        run: RecurringJobExecution,
    ) -> Result<RecurringJobExecution, LeadflowError> {
        let output = run
            .output_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(json)?;

        let result = sqlx::query(
            "UPDATE job_executions SET finished_at = ?, status = ?, duration_ms = ?, processed_items = ?, affected_items = ?, error_message = ?, output_data = ? WHERE id = ? AND tenant_id = ?",
        )
        .bind(encode_opt_ts(run.finished_at))
        .bind(run.status.as_str())
        .bind(run.duration_ms.map(int))
        .bind(int(run.processed_items))
        .bind(int(run.affected_items))
        .bind(&run.error_message)
        .bind(&output)
        .bind(run.id.as_uuid())
        .bind(run.tenant_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(db)?;

        if result.rows_affected() == 0 {
            return Err(not_found("RecurringJobExecution", run.id));
        }
        Ok(run)
    }

    async fn list_job_runs(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
        limit: u32,
    ) -> Result<Vec<RecurringJobExecution>, LeadflowError> {
        let rows: Vec<JobRunRow> = sqlx::query_as(
            "SELECT * FROM job_executions WHERE tenant_id = ? AND job_id = ? ORDER BY started_at DESC LIMIT ?",
        )
        .bind(tenant_id.as_uuid())
        .bind(job_id.as_uuid())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn purge_finished_before(
        &self,
        tenant_id: TenantId,
        cutoff: Timestamp,
    ) -> Result<PurgeReport, LeadflowError> {
        let cutoff = encode_ts(cutoff);
        let mut tx = self.pool.begin().await.map_err(db)?;

        let automation = sqlx::query(
            "DELETE FROM automation_executions WHERE tenant_id = ? AND status IN ('completed', 'failed', 'skipped') AND finished_at IS NOT NULL AND finished_at < ?",
        )
        .bind(tenant_id.as_uuid())
        .bind(&cutoff)
        .execute(&mut *tx)
        .await
        .map_err(db)?
        .rows_affected();

        let jobs = sqlx::query(
            "DELETE FROM job_executions WHERE tenant_id = ? AND status != 'running' AND finished_at IS NOT NULL AND finished_at < ?",
        )
        .bind(tenant_id.as_uuid())
        .bind(&cutoff)
        .execute(&mut *tx)
        .await
        .map_err(db)?
        .rows_affected();

        tx.commit().await.map_err(db)?;
        Ok(PurgeReport { automation, jobs })
    }
}
