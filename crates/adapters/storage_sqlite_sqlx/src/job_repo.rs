//! `SQLite` implementation of [`JobRepository`].
//!
//! Run bookkeeping (`record_success`, `record_failure`, `set_active`) is a
//! single `UPDATE … RETURNING` so concurrent runs never lose a count. Right
//! hand sides of an `UPDATE` see the row as it was before the statement,
//! which is what the circuit-breaker arithmetic relies on.

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use leadflow_app::ports::JobRepository;
use leadflow_domain::error::LeadflowError;
use leadflow_domain::id::{JobId, TenantId};
use leadflow_domain::job::{RecurringJob, parse_timezone};
use leadflow_domain::time::Timestamp;

use crate::error::{db, json};
use crate::row::{self, encode_opt_ts, encode_ts, int, not_found};

struct Wrapper(RecurringJob);

impl Wrapper {
    /// Unwrap the row of an `UPDATE … RETURNING`, which is absent when no
    /// job matched.
    fn updated(value: Option<Self>, id: JobId) -> Result<RecurringJob, LeadflowError> {
        value.map(|w| w.0).ok_or_else(|| not_found("RecurringJob", id))
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let timezone: String = row.try_get("timezone")?;
        let timezone =
            parse_timezone(&timezone).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(RecurringJob {
            id: JobId::from_uuid(row.try_get("id")?),
            tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
            name: row.try_get("name")?,
            kind: row::json(row, "kind")?,
            schedule: row.try_get("schedule")?,
            timezone,
            active: row.try_get("active")?,
            last_run_at: row::opt_ts(row, "last_run_at")?,
            next_run_at: row::opt_ts(row, "next_run_at")?,
            run_count: row::count(row, "run_count")?,
            success_count: row::count(row, "success_count")?,
            error_count: row::count(row, "error_count")?,
            last_error: row.try_get("last_error")?,
            timeout_secs: row::count(row, "timeout_secs")?,
            max_retries: row::small_count(row, "max_retries")?,
            retry_count: row::small_count(row, "retry_count")?,
            created_at: row::ts(row, "created_at")?,
        }))
    }
}

/// `SQLite`-backed recurring job repository.
pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl JobRepository for SqliteJobRepository {
    async fn create(&self, job: RecurringJob) -> Result<RecurringJob, LeadflowError> {
        let kind = serde_json::to_string(&job.kind).map_err(json)?;

        sqlx::query(
            "INSERT INTO recurring_jobs (id, tenant_id, name, kind, schedule, timezone, active, last_run_at, next_run_at, run_count, success_count, error_count, last_error, timeout_secs, max_retries, retry_count, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(job.id.as_uuid())
        .bind(job.tenant_id.as_uuid())
        .bind(&job.name)
        .bind(&kind)
        .bind(&job.schedule)
        .bind(job.timezone.name())
        .bind(job.active)
        .bind(encode_opt_ts(job.last_run_at))
        .bind(encode_opt_ts(job.next_run_at))
        .bind(int(job.run_count))
        .bind(int(job.success_count))
        .bind(int(job.error_count))
        .bind(&job.last_error)
        .bind(int(job.timeout_secs))
        .bind(i64::from(job.max_retries))
        .bind(i64::from(job.retry_count))
        .bind(encode_ts(job.created_at))
        .execute(&self.pool)
        .await
        .map_err(db)?;

        Ok(job)
    }

    async fn get_by_id(
        &self,
        tenant_id: TenantId,
        id: JobId,
    ) -> Result<Option<RecurringJob>, LeadflowError> {
        let row: Option<Wrapper> =
            sqlx::query_as("SELECT * FROM recurring_jobs WHERE id = ? AND tenant_id = ?")
                .bind(id.as_uuid())
                .bind(tenant_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db)?;
        Ok(row.map(|w| w.0))
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<RecurringJob>, LeadflowError> {
        let rows: Vec<Wrapper> = sqlx::query_as(
            "SELECT * FROM recurring_jobs WHERE tenant_id = ? ORDER BY created_at, name",
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn find_all_active(&self) -> Result<Vec<RecurringJob>, LeadflowError> {
        let rows: Vec<Wrapper> =
            sqlx::query_as("SELECT * FROM recurring_jobs WHERE active = 1 ORDER BY created_at")
                .fetch_all(&self.pool)
                .await
                .map_err(db)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn update(&self, job: RecurringJob) -> Result<RecurringJob, LeadflowError> {
        let kind = serde_json::to_string(&job.kind).map_err(json)?;

        let result = sqlx::query(
            "UPDATE recurring_jobs SET name = ?, kind = ?, schedule = ?, timezone = ?, active = ?, next_run_at = ?, last_error = ?, timeout_secs = ?, max_retries = ?, retry_count = ? WHERE id = ? AND tenant_id = ?",
        )
        .bind(&job.name)
        .bind(&kind)
        .bind(&job.schedule)
        .bind(job.timezone.name())
        .bind(job.active)
        .bind(encode_opt_ts(job.next_run_at))
        .bind(&job.last_error)
        .bind(int(job.timeout_secs))
        .bind(i64::from(job.max_retries))
        .bind(i64::from(job.retry_count))
        .bind(job.id.as_uuid())
        .bind(job.tenant_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(db)?;

        if result.rows_affected() == 0 {
            return Err(not_found("RecurringJob", job.id));
        }
        Ok(job)
    }

    async fn delete(&self, tenant_id: TenantId, id: JobId) -> Result<(), LeadflowError> {
        let result = sqlx::query("DELETE FROM recurring_jobs WHERE id = ? AND tenant_id = ?")
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db)?;
        if result.rows_affected() == 0 {
            return Err(not_found("RecurringJob", id));
        }
        Ok(())
    }

    async fn record_success(
        &self,
        tenant_id: TenantId,
        id: JobId,
        at: Timestamp,
        next_run_at: Option<Timestamp>,
    ) -> Result<RecurringJob, LeadflowError> {
        let row: Option<Wrapper> = sqlx::query_as(
            "UPDATE recurring_jobs SET last_run_at = ?, run_count = run_count + 1, success_count = success_count + 1, retry_count = 0, next_run_at = ? WHERE id = ? AND tenant_id = ? RETURNING *",
        )
        .bind(encode_ts(at))
        .bind(encode_opt_ts(next_run_at))
        .bind(id.as_uuid())
        .bind(tenant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        Wrapper::updated(row, id)
    }

    async fn record_failure(
        &self,
        tenant_id: TenantId,
        id: JobId,
        at: Timestamp,
        message: String,
        next_run_at: Option<Timestamp>,
    ) -> Result<RecurringJob, LeadflowError> {
        let row: Option<Wrapper> = sqlx::query_as(
            "UPDATE recurring_jobs SET last_run_at = ?, run_count = run_count + 1, error_count = error_count + 1, retry_count = retry_count + 1, last_error = ?, \
             active = CASE WHEN retry_count + 1 >= max_retries THEN 0 ELSE active END, \
             next_run_at = CASE WHEN retry_count + 1 >= max_retries THEN NULL ELSE ? END \
             WHERE id = ? AND tenant_id = ? RETURNING *",
        )
        .bind(encode_ts(at))
        .bind(message)
        .bind(encode_opt_ts(next_run_at))
        .bind(id.as_uuid())
        .bind(tenant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        Wrapper::updated(row, id)
    }

    async fn set_next_run(
        &self,
        tenant_id: TenantId,
        id: JobId,
        next_run_at: Option<Timestamp>,
    ) -> Result<(), LeadflowError> {
        let result = sqlx::query(
            "UPDATE recurring_jobs SET next_run_at = ? WHERE id = ? AND tenant_id = ?",
        )
        .bind(encode_opt_ts(next_run_at))
        .bind(id.as_uuid())
        .bind(tenant_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(db)?;
        if result.rows_affected() == 0 {
            return Err(not_found("RecurringJob", id));
        }
        Ok(())
    }

    async fn set_active(
        &self,
        tenant_id: TenantId,
        id: JobId,
        active: bool,
    ) -> Result<RecurringJob, LeadflowError> {
        let sql = if active {
            "UPDATE recurring_jobs SET active = 1, retry_count = 0 WHERE id = ? AND tenant_id = ? RETURNING *"
        } else {
            "UPDATE recurring_jobs SET active = 0, next_run_at = NULL WHERE id = ? AND tenant_id = ? RETURNING *"
        };
        let row: Option<Wrapper> = sqlx::query_as(sql)
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        Wrapper::updated(row, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use chrono::TimeZone;
    use leadflow_domain::job::JobKind;

    async fn setup() -> SqliteJobRepository {
        let db = Config::new("sqlite::memory:").build().await.unwrap();
        SqliteJobRepository::new(db.pool().clone())
    }

    fn at(hour: u32) -> Timestamp {
        chrono::Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn cleanup_job(tenant: TenantId, max_retries: u32) -> RecurringJob {
        RecurringJob::builder()
            .tenant_id(tenant)
            .name("Nightly cleanup")
            .kind(JobKind::ExecutionCleanup { retain_days: 30 })
            .schedule("0 3 * * *")
            .timezone(chrono_tz::America::New_York)
            .max_retries(max_retries)
            .created_at(at(1))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_create_and_retrieve_job() {
        let repo = setup().await;
        let tenant = TenantId::new();
        let job = cleanup_job(tenant, 3);
        let id = job.id;

        repo.create(job).await.unwrap();
        let fetched = repo.get_by_id(tenant, id).await.unwrap().unwrap();

        assert_eq!(fetched.kind, JobKind::ExecutionCleanup { retain_days: 30 });
        assert_eq!(fetched.timezone, chrono_tz::America::New_York);
        assert_eq!(fetched.schedule, "0 3 * * *");
        assert_eq!(fetched.max_retries, 3);
        assert_eq!(fetched.created_at, at(1));
        assert!(fetched.active);
    }

    #[tokio::test]
    async fn should_only_return_active_jobs_across_tenants() {
        let repo = setup().await;
        repo.create(cleanup_job(TenantId::new(), 3)).await.unwrap();
        repo.create(cleanup_job(TenantId::new(), 3)).await.unwrap();
        let mut off = cleanup_job(TenantId::new(), 3);
        off.active = false;
        repo.create(off).await.unwrap();

        assert_eq!(repo.find_all_active().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn should_reset_retries_on_success() {
        let repo = setup().await;
        let tenant = TenantId::new();
        let job = cleanup_job(tenant, 3);
        let id = job.id;
        repo.create(job).await.unwrap();
        repo.record_failure(tenant, id, at(2), "boom".to_string(), Some(at(3)))
            .await
            .unwrap();

        let updated = repo
            .record_success(tenant, id, at(3), Some(at(4)))
            .await
            .unwrap();

        assert_eq!(updated.run_count, 2);
        assert_eq!(updated.success_count, 1);
        assert_eq!(updated.error_count, 1);
        assert_eq!(updated.retry_count, 0);
        assert_eq!(updated.last_run_at, Some(at(3)));
        assert_eq!(updated.next_run_at, Some(at(4)));
    }

    #[tokio::test]
    async fn should_trip_circuit_breaker_when_retries_are_exhausted() {
        let repo = setup().await;
        let tenant = TenantId::new();
        let job = cleanup_job(tenant, 2);
        let id = job.id;
        repo.create(job).await.unwrap();

        let first = repo
            .record_failure(tenant, id, at(2), "first".to_string(), Some(at(3)))
            .await
            .unwrap();
        assert!(first.active);
        assert_eq!(first.next_run_at, Some(at(3)));

        let second = repo
            .record_failure(tenant, id, at(3), "second".to_string(), Some(at(4)))
            .await
            .unwrap();
        assert!(!second.active);
        assert_eq!(second.retry_count, 2);
        assert_eq!(second.next_run_at, None);
        assert_eq!(second.last_error.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn should_clear_retries_when_switched_back_on() {
        let repo = setup().await;
        let tenant = TenantId::new();
        let job = cleanup_job(tenant, 1);
        let id = job.id;
        repo.create(job).await.unwrap();
        repo.record_failure(tenant, id, at(2), "boom".to_string(), None)
            .await
            .unwrap();

        let revived = repo.set_active(tenant, id, true).await.unwrap();
        assert!(revived.active);
        assert_eq!(revived.retry_count, 0);

        let stopped = repo.set_active(tenant, id, false).await.unwrap();
        assert!(!stopped.active);
        assert_eq!(stopped.next_run_at, None);
    }

    #[tokio::test]
    async fn should_report_not_found_for_other_tenant() {
        let repo = setup().await;
        let job = cleanup_job(TenantId::new(), 3);
        let id = job.id;
        repo.create(job).await.unwrap();

        let result = repo
            .record_success(TenantId::new(), id, at(2), None)
            .await;
        assert!(matches!(result, Err(LeadflowError::NotFound(_))));
        let result = repo.set_next_run(TenantId::new(), id, None).await;
        assert!(matches!(result, Err(LeadflowError::NotFound(_))));
    }
}
