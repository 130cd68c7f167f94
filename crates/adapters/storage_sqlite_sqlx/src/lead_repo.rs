//! `SQLite` implementation of [`LeadRepository`].
//!
//! Tags live in their own table keyed by `(lead_id, tag)`, so adding or
//! removing one is a single idempotent statement whose affected-row count
//! says whether anything changed.

use std::collections::BTreeSet;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use leadflow_app::ports::LeadRepository;
use leadflow_domain::error::LeadflowError;
use leadflow_domain::id::{LeadId, TenantId};
use leadflow_domain::lead::{Lead, LeadFilter, LeadPatch};
use leadflow_domain::time::Timestamp;

use crate::error::{db, json};
use crate::row::{self, encode_opt_ts, encode_ts, not_found};

const SELECT_LEADS: &str = "SELECT l.*, \
     (SELECT json_group_array(t.tag) FROM lead_tags t WHERE t.lead_id = l.id) AS tags \
     FROM leads l";

struct Wrapper(Lead);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let tags: BTreeSet<String> = row::json(row, "tags")?;

        Ok(Self(Lead {
            id: LeadId::from_uuid(row.try_get("id")?),
            tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            platform: row.try_get("platform")?,
            status: row.try_get("status")?,
            stage: row.try_get("stage")?,
            tags,
            fields: row::json(row, "fields")?,
            created_at: row::ts(row, "created_at")?,
            updated_at: row::ts(row, "updated_at")?,
        }))
    }
}

/// `SQLite`-backed lead repository.
pub struct SqliteLeadRepository {
    pool: SqlitePool,
}

impl SqliteLeadRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn exists(&self, tenant_id: TenantId, id: LeadId) -> Result<bool, LeadflowError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM leads WHERE id = ? AND tenant_id = ?")
                .bind(id.as_uuid())
                .bind(tenant_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db)?;
        Ok(row.is_some())
    }
}

impl LeadRepository for SqliteLeadRepository {
    async fn create(&self, lead: Lead) -> Result<Lead, LeadflowError> {
        let fields = serde_json::to_string(&lead.fields).map_err(json)?;
        let mut tx = self.pool.begin().await.map_err(db)?;

        sqlx::query(
            "INSERT INTO leads (id, tenant_id, name, email, platform, status, stage, fields, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(lead.id.as_uuid())
        .bind(lead.tenant_id.as_uuid())
        .bind(&lead.name)
        .bind(&lead.email)
        .bind(&lead.platform)
        .bind(&lead.status)
        .bind(&lead.stage)
        .bind(&fields)
        .bind(encode_ts(lead.created_at))
        .bind(encode_ts(lead.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        for tag in &lead.tags {
            sqlx::query("INSERT INTO lead_tags (lead_id, tag) VALUES (?, ?)")
                .bind(lead.id.as_uuid())
                .bind(tag)
                .execute(&mut *tx)
                .await
                .map_err(db)?;
        }

        tx.commit().await.map_err(db)?;
        Ok(lead)
    }

    async fn get_by_id(
        &self,
        tenant_id: TenantId,
        id: LeadId,
    ) -> Result<Option<Lead>, LeadflowError> {
        let sql = format!("{SELECT_LEADS} WHERE l.id = ? AND l.tenant_id = ?");
        let row: Option<Wrapper> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        Ok(row.map(|w| w.0))
    }

    async fn update(
        &self,
        tenant_id: TenantId,
        id: LeadId,
        patch: LeadPatch,
        at: Timestamp,
    ) -> Result<Lead, LeadflowError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        let sql = format!("{SELECT_LEADS} WHERE l.id = ? AND l.tenant_id = ?");
        let row: Option<Wrapper> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db)?;
        let mut lead = row.map(|w| w.0).ok_or_else(|| not_found("Lead", id))?;

        lead.apply(patch, at);
        let fields = serde_json::to_string(&lead.fields).map_err(json)?;

        sqlx::query(
            "UPDATE leads SET status = ?, stage = ?, fields = ?, updated_at = ? WHERE id = ? AND tenant_id = ?",
        )
        .bind(&lead.status)
        .bind(&lead.stage)
        .bind(&fields)
        .bind(encode_ts(lead.updated_at))
        .bind(id.as_uuid())
        .bind(tenant_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        tx.commit().await.map_err(db)?;
        Ok(lead)
    }

    async fn add_tag(
        &self,
        tenant_id: TenantId,
        id: LeadId,
        tag: String,
    ) -> Result<bool, LeadflowError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO lead_tags (lead_id, tag) SELECT id, ? FROM leads WHERE id = ? AND tenant_id = ?",
        )
        .bind(&tag)
        .bind(id.as_uuid())
        .bind(tenant_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(db)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        if self.exists(tenant_id, id).await? {
            Ok(false)
        } else {
            Err(not_found("Lead", id))
        }
    }

    async fn remove_tag(
        &self,
        tenant_id: TenantId,
        id: LeadId,
        tag: String,
    ) -> Result<bool, LeadflowError> {
        if !self.exists(tenant_id, id).await? {
            return Err(not_found("Lead", id));
        }
        let result = sqlx::query("DELETE FROM lead_tags WHERE lead_id = ? AND tag = ?")
            .bind(id.as_uuid())
            .bind(&tag)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(
        &self,
        tenant_id: TenantId,
        filter: LeadFilter,
    ) -> Result<Vec<Lead>, LeadflowError> {
        let sql = format!(
            "{SELECT_LEADS} WHERE l.tenant_id = ? \
             AND (? IS NULL OR l.status = ?) \
             AND (? IS NULL OR l.stage = ?) \
             AND (? IS NULL OR l.updated_at < ?) \
             AND (? IS NULL OR l.created_at >= ?) \
             ORDER BY l.created_at"
        );
        let updated_before = encode_opt_ts(filter.updated_before);
        let created_since = encode_opt_ts(filter.created_since);

        let rows: Vec<Wrapper> = sqlx::query_as(&sql)
            .bind(tenant_id.as_uuid())
            .bind(&filter.status)
            .bind(&filter.status)
            .bind(&filter.stage)
            .bind(&filter.stage)
            .bind(&updated_before)
            .bind(&updated_before)
            .bind(&created_since)
            .bind(&created_since)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}
