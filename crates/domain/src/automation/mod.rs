//! Automation — trigger → condition → action rules.
//!
//! A rule listens for one [`TriggerType`], guards on payload
//! [`Condition`]s and runs an ordered list of [`Action`]s against the lead
//! that raised the event. Every firing is recorded as an
//! [`AutomationExecution`].

mod action;
mod condition;
mod execution;
mod trigger;

pub use action::{Action, render_template};
pub use condition::{Condition, evaluate_all};
pub use execution::{ActionResult, AutomationExecution, ExecutionStatus};
pub use trigger::TriggerType;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::{LeadflowError, ValidationError};
use crate::id::{LeadId, RuleId, TenantId};
use crate::time::{self, Timestamp};

/// Longest accepted rule delay: 100 years. Keeps every `scheduled_for` a
/// four-digit-year instant.
pub const MAX_DELAY_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// A tenant's rule reacting to lead events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: RuleId,
    pub tenant_id: TenantId,
    pub name: String,
    pub trigger: TriggerType,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    pub active: bool,
    /// Higher fires first.
    pub priority: i32,
    pub execution_count: u64,
    pub last_executed_at: Option<Timestamp>,
    /// Seconds between matching and running the actions.
    pub delay_secs: u64,
    pub created_at: Timestamp,
}

impl AutomationRule {
    /// Create a builder for constructing an [`AutomationRule`].
    #[must_use]
    pub fn builder() -> AutomationRuleBuilder {
        AutomationRuleBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`LeadflowError::Validation`] when:
    /// - `name` is empty ([`ValidationError::EmptyName`])
    /// - the rule is active without actions ([`ValidationError::NoActions`])
    /// - an action has a blank target ([`ValidationError::InvalidAction`])
    /// - `delay_secs` exceeds [`MAX_DELAY_SECS`] ([`ValidationError::DelayTooLong`])
    pub fn validate(&self) -> Result<(), LeadflowError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.delay_secs > MAX_DELAY_SECS {
            return Err(ValidationError::DelayTooLong(self.delay_secs).into());
        }
        if self.active && self.actions.is_empty() {
            return Err(ValidationError::NoActions.into());
        }
        for action in &self.actions {
            action.validate()?;
        }
        Ok(())
    }

    /// Delay between matching and dispatch, capped at [`MAX_DELAY_SECS`].
    #[must_use]
    pub fn delay(&self) -> TimeDelta {
        time::seconds(self.delay_secs.min(MAX_DELAY_SECS))
    }

    /// Firing order: priority descending, then oldest first.
    #[must_use]
    pub fn firing_order(a: &Self, b: &Self) -> std::cmp::Ordering {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
    }

    /// Pending execution for an event matching this rule.
    #[must_use]
    pub fn schedule(&self, event: &TriggerEvent, now: Timestamp) -> AutomationExecution {
        AutomationExecution::pending(
            self.tenant_id,
            self.id,
            event.subject_id,
            event.payload.clone(),
            u32::try_from(self.actions.len()).unwrap_or(u32::MAX),
            now + self.delay(),
            now,
        )
    }
}

/// An incoming lead event, scoped to one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub tenant_id: TenantId,
    pub trigger: TriggerType,
    pub subject_id: Option<LeadId>,
    pub payload: serde_json::Value,
}

impl TriggerEvent {
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        trigger: TriggerType,
        subject_id: Option<LeadId>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            tenant_id,
            trigger,
            subject_id,
            payload,
        }
    }
}

/// Step-by-step builder for [`AutomationRule`].
#[derive(Debug, Default)]
pub struct AutomationRuleBuilder {
    id: Option<RuleId>,
    tenant_id: Option<TenantId>,
    name: Option<String>,
    trigger: Option<TriggerType>,
    conditions: Vec<Condition>,
    actions: Vec<Action>,
    active: Option<bool>,
    priority: i32,
    delay_secs: u64,
    created_at: Option<Timestamp>,
}

impl AutomationRuleBuilder {
    #[must_use]
    pub fn id(mut self, id: RuleId) -> Self {
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
    pub fn trigger(mut self, trigger: TriggerType) -> Self {
        self.trigger = Some(trigger);
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn delay_secs(mut self, delay_secs: u64) -> Self {
        self.delay_secs = delay_secs;
        self
    }

    #[must_use]
    pub fn created_at(mut self, ts: Timestamp) -> Self {
        self.created_at = Some(ts);
        self
    }

    /// Consume the builder, validate, and return an [`AutomationRule`].
    ///
    /// # Errors
    ///
    /// Returns [`LeadflowError::Validation`] if required fields are missing or empty.
    pub fn build(self) -> Result<AutomationRule, LeadflowError> {
        let rule = AutomationRule {
            id: self.id.unwrap_or_default(),
            tenant_id: self.tenant_id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            trigger: self.trigger.unwrap_or(TriggerType::Manual),
            conditions: self.conditions,
            actions: self.actions,
            active: self.active.unwrap_or(true),
            priority: self.priority,
            execution_count: 0,
            last_executed_at: None,
            delay_secs: self.delay_secs,
            created_at: self.created_at.unwrap_or_else(time::now),
        };
        rule.validate()?;
        Ok(rule)
    }
}
