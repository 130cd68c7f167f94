//! `SQLite` implementation of [`RuleRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use leadflow_app::ports::RuleRepository;
use leadflow_domain::automation::{AutomationRule, TriggerType};
use leadflow_domain::error::LeadflowError;
use leadflow_domain::id::{RuleId, TenantId};
use leadflow_domain::time::Timestamp;

use crate::error::{db, json};
use crate::row::{self, encode_opt_ts, encode_ts, int, not_found};

struct Wrapper(AutomationRule);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<AutomationRule> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self(AutomationRule {
            id: RuleId::from_uuid(row.try_get("id")?),
            tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
            name: row.try_get("name")?,
            trigger: row::parsed::<TriggerType>(row, "trigger_type")?,
            conditions: row::json(row, "conditions")?,
            actions: row::json(row, "actions")?,
            active: row.try_get("active")?,
            priority: row.try_get("priority")?,
            execution_count: row::count(row, "execution_count")?,
            last_executed_at: row::opt_ts(row, "last_executed_at")?,
            delay_secs: row::count(row, "delay_secs")?,
            created_at: row::ts(row, "created_at")?,
        }))
    }
}

/// `SQLite`-backed automation rule repository.
pub struct SqliteRuleRepository {
    pool: SqlitePool,
}

impl SqliteRuleRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl RuleRepository for SqliteRuleRepository {
    async fn create(&self, rule: AutomationRule) -> Result<AutomationRule, LeadflowError> {
        let conditions = serde_json::to_string(&rule.conditions).map_err(json)?;
        let actions = serde_json::to_string(&rule.actions).map_err(json)?;

        sqlx::query(
            "INSERT INTO automation_rules (id, tenant_id, name, trigger_type, conditions, actions, active, priority, delay_secs, execution_count, last_executed_at, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(rule.id.as_uuid())
        .bind(rule.tenant_id.as_uuid())
        .bind(&rule.name)
        .bind(rule.trigger.as_str())
        .bind(&conditions)
        .bind(&actions)
        .bind(rule.active)
        .bind(rule.priority)
        .bind(int(rule.delay_secs))
        .bind(int(rule.execution_count))
        .bind(encode_opt_ts(rule.last_executed_at))
        .bind(encode_ts(rule.created_at))
        .execute(&self.pool)
        .await
        .map_err(db)?;

        Ok(rule)
    }

    async fn get_by_id(
        &self,
        tenant_id: TenantId,
        id: RuleId,
    ) -> Result<Option<AutomationRule>, LeadflowError> {
        let row: Option<Wrapper> =
            sqlx::query_as("SELECT * FROM automation_rules WHERE id = ? AND tenant_id = ?")
                .bind(id.as_uuid())
                .bind(tenant_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db)?;
        Ok(Wrapper::maybe(row))
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<AutomationRule>, LeadflowError> {
        let rows: Vec<Wrapper> = sqlx::query_as(
            "SELECT * FROM automation_rules WHERE tenant_id = ? ORDER BY created_at, name",
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn find_active(
        &self,
        tenant_id: TenantId,
        trigger: TriggerType,
    ) -> Result<Vec<AutomationRule>, LeadflowError> {
        let rows: Vec<Wrapper> = sqlx::query_as(
            "SELECT * FROM automation_rules WHERE tenant_id = ? AND trigger_type = ? AND active = 1 ORDER BY priority DESC, created_at",
        )
        .bind(tenant_id.as_uuid())
        .bind(trigger.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn update(&self, rule: AutomationRule) -> Result<AutomationRule, LeadflowError> {
        let conditions = serde_json::to_string(&rule.conditions).map_err(json)?;
        let actions = serde_json::to_string(&rule.actions).map_err(json)?;

        // Counters belong to `record_trigger` and are left untouched.
        let result = sqlx::query(
            "UPDATE automation_rules SET name = ?, trigger_type = ?, conditions = ?, actions = ?, active = ?, priority = ?, delay_secs = ? WHERE id = ? AND tenant_id = ?",
        )
        .bind(&rule.name)
        .bind(rule.trigger.as_str())
        .bind(&conditions)
        .bind(&actions)
        .bind(rule.active)
        .bind(rule.priority)
        .bind(int(rule.delay_secs))
        .bind(rule.id.as_uuid())
        .bind(rule.tenant_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(db)?;

        if result.rows_affected() == 0 {
            return Err(not_found("AutomationRule", rule.id));
        }
        Ok(rule)
    }

    async fn delete(&self, tenant_id: TenantId, id: RuleId) -> Result<(), LeadflowError> {
        let result = sqlx::query("DELETE FROM automation_rules WHERE id = ? AND tenant_id = ?")
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db)?;
        if result.rows_affected() == 0 {
            return Err(not_found("AutomationRule", id));
        }
        Ok(())
    }

    async fn record_trigger(
        &self,
        tenant_id: TenantId,
        id: RuleId,
        at: Timestamp,
    ) -> Result<(), LeadflowError> {
        let result = sqlx::query(
            "UPDATE automation_rules SET execution_count = execution_count + 1, last_executed_at = ? WHERE id = ? AND tenant_id = ?",
        )
        .bind(encode_ts(at))
        .bind(id.as_uuid())
        .bind(tenant_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(db)?;
        if result.rows_affected() == 0 {
            return Err(not_found("AutomationRule", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use chrono::TimeZone;
    use leadflow_domain::automation::{Action, Condition};

    async fn setup() -> SqliteRuleRepository {
        let db = Config::new("sqlite::memory:").build().await.unwrap();
        SqliteRuleRepository::new(db.pool().clone())
    }

    fn at(hour: u32) -> Timestamp {
        chrono::Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn rule(tenant: TenantId, trigger: TriggerType, priority: i32, hour: u32) -> AutomationRule {
        AutomationRule::builder()
            .tenant_id(tenant)
            .name(format!("rule p{priority}"))
            .trigger(trigger)
            .condition(Condition::equals("platform", serde_json::json!("instagram")))
            .action(Action::AddTag {
                tag: "social".to_string(),
            })
            .priority(priority)
            .delay_secs(600)
            .created_at(at(hour))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_create_and_retrieve_rule() {
        let repo = setup().await;
        let tenant = TenantId::new();
        let original = rule(tenant, TriggerType::LeadCreated, 3, 8);
        let id = original.id;

        repo.create(original.clone()).await.unwrap();
        let fetched = repo.get_by_id(tenant, id).await.unwrap().unwrap();

        assert_eq!(fetched.id, id);
        assert_eq!(fetched.tenant_id, tenant);
        assert_eq!(fetched.trigger, TriggerType::LeadCreated);
        assert_eq!(fetched.conditions, original.conditions);
        assert_eq!(fetched.actions, original.actions);
        assert_eq!(fetched.delay_secs, 600);
        assert_eq!(fetched.created_at, at(8));
        assert!(fetched.active);
    }

    #[tokio::test]
    async fn should_return_none_for_other_tenant() {
        let repo = setup().await;
        let original = rule(TenantId::new(), TriggerType::LeadCreated, 0, 8);
        let id = original.id;
        repo.create(original).await.unwrap();

        assert!(repo.get_by_id(TenantId::new(), id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_find_active_rules_by_priority_then_age() {
        let repo = setup().await;
        let tenant = TenantId::new();
        let low = rule(tenant, TriggerType::StatusChanged, 1, 8);
        let high_new = rule(tenant, TriggerType::StatusChanged, 5, 10);
        let high_old = rule(tenant, TriggerType::StatusChanged, 5, 9);
        let mut inactive = rule(tenant, TriggerType::StatusChanged, 9, 8);
        inactive.active = false;
        let other_trigger = rule(tenant, TriggerType::TagAdded, 9, 8);
        let expected = vec![high_old.id, high_new.id, low.id];
        for r in [low, high_new, high_old, inactive, other_trigger] {
            repo.create(r).await.unwrap();
        }

        let found = repo
            .find_active(tenant, TriggerType::StatusChanged)
            .await
            .unwrap();

        let ids: Vec<_> = found.iter().map(|r| r.id).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn should_increment_trigger_counter() {
        let repo = setup().await;
        let tenant = TenantId::new();
        let original = rule(tenant, TriggerType::LeadCreated, 0, 8);
        let id = original.id;
        repo.create(original).await.unwrap();

        repo.record_trigger(tenant, id, at(11)).await.unwrap();
        repo.record_trigger(tenant, id, at(12)).await.unwrap();

        let fetched = repo.get_by_id(tenant, id).await.unwrap().unwrap();
        assert_eq!(fetched.execution_count, 2);
        assert_eq!(fetched.last_executed_at, Some(at(12)));
    }

    #[tokio::test]
    async fn should_update_definition_without_resetting_counters() {
        let repo = setup().await;
        let tenant = TenantId::new();
        let original = rule(tenant, TriggerType::LeadCreated, 0, 8);
        let id = original.id;
        repo.create(original.clone()).await.unwrap();
        repo.record_trigger(tenant, id, at(9)).await.unwrap();

        let mut changed = original;
        changed.name = "renamed".to_string();
        changed.active = false;
        repo.update(changed).await.unwrap();

        let fetched = repo.get_by_id(tenant, id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "renamed");
        assert!(!fetched.active);
        assert_eq!(fetched.execution_count, 1);
    }

    #[tokio::test]
    async fn should_report_not_found_when_deleting_unknown_rule() {
        let repo = setup().await;
        let result = repo.delete(TenantId::new(), RuleId::new()).await;
        assert!(matches!(result, Err(LeadflowError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_delete_rule() {
        let repo = setup().await;
        let tenant = TenantId::new();
        let original = rule(tenant, TriggerType::LeadCreated, 0, 8);
        let id = original.id;
        repo.create(original).await.unwrap();

        repo.delete(tenant, id).await.unwrap();

        assert!(repo.list(tenant).await.unwrap().is_empty());
    }
}
