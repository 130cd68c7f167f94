//! Rule service — use-cases for managing automation rules.

use leadflow_domain::automation::{AutomationExecution, AutomationRule};
use leadflow_domain::error::{LeadflowError, NotFoundError};
use leadflow_domain::id::{RuleId, TenantId};

use crate::ports::{ExecutionStats, ExecutionStore, RuleRepository};

/// Application service for tenant-scoped rule management and execution history.
pub struct RuleService<R, E> {
    repo: R,
    executions: E,
}

impl<R: RuleRepository, E: ExecutionStore> RuleService<R, E> {
    /// Create a new service backed by the given repository and store.
    pub fn new(repo: R, executions: E) -> Self {
        Self { repo, executions }
    }

    /// Create a new rule after validating domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`LeadflowError::Validation`] if invariants fail, or a
    /// storage error propagated from the repository.
    #[tracing::instrument(skip(self, rule), fields(tenant_id = %rule.tenant_id, rule_name = %rule.name))]
    pub async fn create_rule(&self, rule: AutomationRule) -> Result<AutomationRule, LeadflowError> {
        rule.validate()?;
        self.repo.create(rule).await
    }

    /// Look up a rule by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`LeadflowError::NotFound`] when no rule with `id` exists for
    /// `tenant_id`, or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_rule(
        &self,
        tenant_id: TenantId,
        id: RuleId,
    ) -> Result<AutomationRule, LeadflowError> {
        self.repo.get_by_id(tenant_id, id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "AutomationRule",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all rules of a tenant.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_rules(&self, tenant_id: TenantId) -> Result<Vec<AutomationRule>, LeadflowError> {
        self.repo.list(tenant_id).await
    }

    /// Update an existing rule.
    ///
    /// # Errors
    ///
    /// Returns [`LeadflowError::Validation`] if invariants fail, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self, rule), fields(tenant_id = %rule.tenant_id, rule_id = %rule.id))]
    pub async fn update_rule(&self, rule: AutomationRule) -> Result<AutomationRule, LeadflowError> {
        rule.validate()?;
        self.repo.update(rule).await
    }

    /// Switch a rule on or off. Executions already scheduled for a rule that
    /// is switched off are skipped when they come due.
    ///
    /// # Errors
    ///
    /// Returns [`LeadflowError::NotFound`] for an unknown rule and
    /// [`LeadflowError::Validation`] when activating a rule without actions.
    #[tracing::instrument(skip(self))]
    pub async fn set_active(
        &self,
        tenant_id: TenantId,
        id: RuleId,
        active: bool,
    ) -> Result<AutomationRule, LeadflowError> {
        let mut rule = self.get_rule(tenant_id, id).await?;
        rule.active = active;
        rule.validate()?;
        self.repo.update(rule).await
    }

    /// Delete a rule by id.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete_rule(&self, tenant_id: TenantId, id: RuleId) -> Result<(), LeadflowError> {
        self.repo.delete(tenant_id, id).await
    }

    /// Most recent executions of a tenant, optionally for one rule.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the store.
    pub async fn list_executions(
        &self,
        tenant_id: TenantId,
        rule_id: Option<RuleId>,
        limit: u32,
    ) -> Result<Vec<AutomationExecution>, LeadflowError> {
        self.executions
            .list_automations(tenant_id, rule_id, limit)
            .await
    }

    /// Execution counts per status for a tenant.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the store.
    pub async fn execution_stats(&self, tenant_id: TenantId) -> Result<ExecutionStats, LeadflowError> {
        self.executions.automation_stats(tenant_id).await
    }
}
