//! Automation engine — matches trigger events against a tenant's rules.
//!
//! For each incoming [`TriggerEvent`] the engine loads the active rules of
//! the event's tenant and trigger, walks them in firing order and, for every
//! rule whose conditions hold, records a `pending` execution. Executions
//! without delay are handed to the dispatcher at once; delayed ones wait for
//! the due-execution poller.

use leadflow_domain::automation::{AutomationRule, TriggerEvent, evaluate_all};
use leadflow_domain::error::LeadflowError;
use leadflow_domain::id::ExecutionId;
use leadflow_domain::time::Timestamp;

use crate::dispatcher::Dispatch;
use crate::ports::{Clock, ExecutionStore, RuleRepository};

/// Evaluates trigger events and schedules rule executions.
pub struct AutomationEngine<R, E, C, D> {
    rules: R,
    executions: E,
    clock: C,
    dispatcher: D,
}

impl<R, E, C, D> AutomationEngine<R, E, C, D>
where
    R: RuleRepository + Send + Sync,
    E: ExecutionStore + Send + Sync,
    C: Clock,
    D: Dispatch,
{
    /// Create a new engine.
    pub fn new(rules: R, executions: E, clock: C, dispatcher: D) -> Self {
        Self {
            rules,
            executions,
            clock,
            dispatcher,
        }
    }

    /// Schedule an execution for every matching rule, in firing order.
    ///
    /// A rule that cannot be evaluated or recorded is logged and skipped;
    /// the remaining rules are still processed.
    ///
    /// # Errors
    ///
    /// Returns a storage error only if the rules themselves cannot be loaded.
    #[tracing::instrument(skip(self, event), fields(tenant_id = %event.tenant_id, trigger = %event.trigger))]
    pub async fn evaluate(&self, event: &TriggerEvent) -> Result<Vec<ExecutionId>, LeadflowError> {
        let mut rules = self
            .rules
            .find_active(event.tenant_id, event.trigger)
            .await?;
        rules.sort_by(AutomationRule::firing_order);

        let now = self.clock.now();
        let mut scheduled = Vec::new();
        for rule in &rules {
            match self.schedule_rule(rule, event, now).await {
                Ok(Some(id)) => scheduled.push(id),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(rule_id = %rule.id, error = %err, "rule evaluation failed");
                }
            }
        }

        tracing::debug!(
            candidates = rules.len(),
            scheduled = scheduled.len(),
            "trigger evaluated"
        );
        Ok(scheduled)
    }

    async fn schedule_rule(
        &self,
        rule: &AutomationRule,
        event: &TriggerEvent,
        now: Timestamp,
    ) -> Result<Option<ExecutionId>, LeadflowError> {
        if !evaluate_all(&rule.conditions, &event.payload)? {
            return Ok(None);
        }

        let execution = self
            .executions
            .create_automation(rule.schedule(event, now))
            .await?;

        if let Err(err) = self.rules.record_trigger(rule.tenant_id, rule.id, now).await {
            tracing::warn!(rule_id = %rule.id, error = %err, "could not update rule counters");
        }

        if execution.is_due(now) {
            self.dispatcher.dispatch(execution.tenant_id, execution.id);
        } else {
            tracing::debug!(
                rule_id = %rule.id,
                execution_id = %execution.id,
                scheduled_for = %execution.scheduled_for,
                "execution delayed"
            );
        }
        Ok(Some(execution.id))
    }

    /// Hand every due `pending` execution (up to `limit`) to the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns a storage error if due executions cannot be loaded.
    pub async fn dispatch_due(&self, limit: u32) -> Result<usize, LeadflowError> {
        let due = self
            .executions
            .find_due_automations(self.clock.now(), limit)
            .await?;
        for execution in &due {
            self.dispatcher.dispatch(execution.tenant_id, execution.id);
        }
        if !due.is_empty() {
            tracing::debug!(count = due.len(), "due executions dispatched");
        }
        Ok(due.len())
    }
}
