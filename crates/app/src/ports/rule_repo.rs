//! Rule repository port — persistence for automation rules.

use std::future::Future;
use std::sync::Arc;

use leadflow_domain::automation::{AutomationRule, TriggerType};
use leadflow_domain::error::LeadflowError;
use leadflow_domain::id::{RuleId, TenantId};
use leadflow_domain::time::Timestamp;

/// Repository for persisting and querying [`AutomationRule`]s.
pub trait RuleRepository {
    /// Create a new rule in storage.
    fn create(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, LeadflowError>> + Send;

    /// Get a rule of `tenant_id` by its identifier.
    fn get_by_id(
        &self,
        tenant_id: TenantId,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<AutomationRule>, LeadflowError>> + Send;

    /// Get all rules of a tenant.
    fn list(
        &self,
        tenant_id: TenantId,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, LeadflowError>> + Send;

    /// Active rules of a tenant listening for `trigger`, priority descending
    /// then oldest first.
    fn find_active(
        &self,
        tenant_id: TenantId,
        trigger: TriggerType,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, LeadflowError>> + Send;

    /// Replace an existing rule.
    ///
    /// Fails with [`LeadflowError::NotFound`] when the rule does not exist
    /// for its tenant.
    fn update(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, LeadflowError>> + Send;

    /// Delete a rule.
    fn delete(
        &self,
        tenant_id: TenantId,
        id: RuleId,
    ) -> impl Future<Output = Result<(), LeadflowError>> + Send;

    /// Atomically bump `execution_count` and set `last_executed_at`.
    fn record_trigger(
        &self,
        tenant_id: TenantId,
        id: RuleId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), LeadflowError>> + Send;
}

impl<T: RuleRepository + Send + Sync> RuleRepository for Arc<T> {
    fn create(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, LeadflowError>> + Send {
        (**self).create(rule)
    }

    fn get_by_id(
        &self,
        tenant_id: TenantId,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<AutomationRule>, LeadflowError>> + Send {
        (**self).get_by_id(tenant_id, id)
    }

    fn list(
        &self,
        tenant_id: TenantId,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, LeadflowError>> + Send {
        (**self).list(tenant_id)
    }

    fn find_active(
        &self,
        tenant_id: TenantId,
        trigger: TriggerType,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, LeadflowError>> + Send {
        (**self).find_active(tenant_id, trigger)
    }

    fn update(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, LeadflowError>> + Send {
        (**self).update(rule)
    }

    fn delete(
        &self,
        tenant_id: TenantId,
        id: RuleId,
    ) -> impl Future<Output = Result<(), LeadflowError>> + Send {
        (**self).delete(tenant_id, id)
    }

    fn record_trigger(
        &self,
        tenant_id: TenantId,
        id: RuleId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), LeadflowError>> + Send {
        (**self).record_trigger(tenant_id, id, at)
    }
}
