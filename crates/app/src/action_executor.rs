//! Action executor — runs the ordered actions of one automation execution.
//!
//! The executor is the only writer of an execution once it leaves `pending`.
//! Ownership is taken with a compare-and-set claim in the store, so two
//! workers handed the same execution never both run it. Each action is
//! isolated: a failing action is recorded and the next one still runs.

use std::future::Future;

use leadflow_domain::automation::{
    Action, ActionResult, AutomationExecution, AutomationRule, ExecutionStatus, render_template,
};
use leadflow_domain::error::{LeadflowError, NotFoundError, NotifyError};
use leadflow_domain::id::{ExecutionId, LeadId, TenantId};
use leadflow_domain::lead::{Lead, LeadPatch};
use serde_json::{Value, json};

use crate::dispatcher::ExecutionRunner;
use crate::ports::{Clock, ExecutionStore, LeadRepository, Notifier, RuleRepository};

/// Why a single action failed. Recorded in the execution's results.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("{0} needs a lead but the execution has no subject")]
    NoSubject(&'static str),

    #[error("lead {0} not found")]
    LeadNotFound(LeadId),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error("lead store failed: {0}")]
    Store(#[from] LeadflowError),
}

/// How a call to [`ActionExecutor::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every action was attempted.
    Completed {
        actions_completed: u32,
        actions_total: u32,
    },
    /// The rule was gone or switched off; nothing ran.
    Skipped,
    /// The execution had already left `pending`.
    NotPending,
    /// Another worker claimed the execution first.
    ClaimLost,
}

/// Runs the actions of claimed executions against leads and the notifier.
pub struct ActionExecutor<R, L, E, N, C> {
    rules: R,
    leads: L,
    executions: E,
    notifier: N,
    clock: C,
}

impl<R, L, E, N, C> ActionExecutor<R, L, E, N, C>
where
    R: RuleRepository + Send + Sync,
    L: LeadRepository + Send + Sync,
    E: ExecutionStore + Send + Sync,
    N: Notifier,
    C: Clock,
{
    /// Create a new executor.
    pub fn new(rules: R, leads: L, executions: E, notifier: N, clock: C) -> Self {
        Self {
            rules,
            leads,
            executions,
            notifier,
            clock,
        }
    }

    /// Run execution `id` of `tenant_id` if it is still `pending`.
    ///
    /// # Errors
    ///
    /// Returns [`LeadflowError::NotFound`] when the execution does not exist,
    /// or the store error that stopped the run. In the latter case the
    /// execution has been marked `failed` on a best-effort basis.
    #[tracing::instrument(skip(self), fields(rule_id = tracing::field::Empty))]
    pub async fn run(
        &self,
        tenant_id: TenantId,
        execution_id: ExecutionId,
    ) -> Result<RunOutcome, LeadflowError> {
        let mut execution = self
            .executions
            .get_automation(tenant_id, execution_id)
            .await?
            .ok_or_else(|| NotFoundError {
                entity: "AutomationExecution",
                id: execution_id.to_string(),
            })?;
        tracing::Span::current().record("rule_id", tracing::field::display(execution.rule_id));

        if execution.status != ExecutionStatus::Pending {
            tracing::debug!(status = %execution.status, "execution already left pending");
            return Ok(RunOutcome::NotPending);
        }

        let rule = self
            .rules
            .get_by_id(tenant_id, execution.rule_id)
            .await?
            .filter(|rule| rule.active);
        let Some(rule) = rule else {
            let skipped = self
                .executions
                .skip_automation(tenant_id, execution_id, self.clock.now())
                .await?;
            tracing::info!(skipped, "rule missing or inactive, execution skipped");
            return Ok(if skipped {
                RunOutcome::Skipped
            } else {
                RunOutcome::ClaimLost
            });
        };

        let started = self.clock.now();
        if !self
            .executions
            .claim_automation(tenant_id, execution_id, started)
            .await?
        {
            tracing::debug!("execution claimed by another worker");
            return Ok(RunOutcome::ClaimLost);
        }
        execution.transition(ExecutionStatus::Running)?;
        execution.executed_at = Some(started);
        // The rule may have been edited since scheduling; run what it says now.
        execution.actions_total = u32::try_from(rule.actions.len()).unwrap_or(u32::MAX);

        match self.drive(&rule, &mut execution).await {
            Ok(()) => Ok(RunOutcome::Completed {
                actions_completed: execution.actions_completed,
                actions_total: execution.actions_total,
            }),
            Err(err) => {
                tracing::error!(error = %err, "execution machinery failed");
                self.mark_failed(execution, &err).await;
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        rule: &AutomationRule,
        execution: &mut AutomationExecution,
    ) -> Result<(), LeadflowError> {
        for (index, action) in rule.actions.iter().enumerate() {
            let result = match self.perform(execution, action).await {
                Ok(output) => ActionResult::succeeded(index, action.kind(), output),
                Err(err) => {
                    tracing::warn!(index, kind = action.kind(), error = %err, "action failed");
                    ActionResult::failed(index, action.kind(), err.to_string())
                }
            };
            execution.record_action(result);
            self.executions.update_automation(execution.clone()).await?;
        }

        let mut finished = execution.clone();
        finished.complete(self.clock.now())?;
        *execution = self.executions.update_automation(finished).await?;
        tracing::info!(
            completed = execution.actions_completed,
            total = execution.actions_total,
            "execution completed"
        );
        Ok(())
    }

    /// Mark execution `id` failed when its run died mid-flight. Only a
    /// `running` record is touched.
    ///
    /// # Errors
    ///
    /// Returns storage errors from reading or writing the execution.
    #[tracing::instrument(skip(self, reason))]
    pub async fn abandon(
        &self,
        tenant_id: TenantId,
        execution_id: ExecutionId,
        reason: &str,
    ) -> Result<bool, LeadflowError> {
        let Some(mut execution) = self
            .executions
            .get_automation(tenant_id, execution_id)
            .await?
        else {
            return Ok(false);
        };
        if execution.status != ExecutionStatus::Running {
            return Ok(false);
        }
        execution.fail(self.clock.now(), reason)?;
        self.executions.update_automation(execution).await?;
        tracing::warn!(reason, "abandoned execution marked failed");
        Ok(true)
    }

    async fn mark_failed(&self, mut execution: AutomationExecution, err: &LeadflowError) {
        if execution.fail(self.clock.now(), err.to_string()).is_err() {
            return;
        }
        if let Err(write_err) = self.executions.update_automation(execution).await {
            tracing::warn!(error = %write_err, "could not record execution failure");
        }
    }

    async fn perform(
        &self,
        execution: &AutomationExecution,
        action: &Action,
    ) -> Result<Value, ActionError> {
        let tenant_id = execution.tenant_id;
        let subject = match (action.needs_subject(), execution.subject_id) {
            (true, None) => return Err(ActionError::NoSubject(action.kind())),
            (_, subject) => subject,
        };
        // `needs_subject` guarantees a lead id for every arm but `Notify`.
        let lead_id = subject.unwrap_or_default();

        match action {
            Action::UpdateStatus { status } => {
                let lead = self
                    .patch_lead(tenant_id, lead_id, LeadPatch::status(status.as_str()))
                    .await?;
                Ok(json!({ "status": lead.status }))
            }
            Action::MoveStage { stage } => {
                let lead = self
                    .patch_lead(tenant_id, lead_id, LeadPatch::stage(stage.as_str()))
                    .await?;
                Ok(json!({ "stage": lead.stage }))
            }
            Action::UpdateField { field, value } => {
                self.patch_lead(tenant_id, lead_id, LeadPatch::field(field.as_str(), value.clone()))
                    .await?;
                Ok(json!({ "field": field, "value": value }))
            }
            Action::AddTag { tag } => {
                let added = self
                    .leads
                    .add_tag(tenant_id, lead_id, tag.clone())
                    .await
                    .map_err(|err| lead_error(lead_id, err))?;
                Ok(json!({ "tag": tag, "added": added }))
            }
            Action::RemoveTag { tag } => {
                let removed = self
                    .leads
                    .remove_tag(tenant_id, lead_id, tag.clone())
                    .await
                    .map_err(|err| lead_error(lead_id, err))?;
                Ok(json!({ "tag": tag, "removed": removed }))
            }
            Action::Notify { recipient, message } => {
                let rendered = render_template(message, &execution.trigger_data);
                self.notifier.notify(recipient, &rendered)?;
                Ok(json!({ "recipient": recipient, "message": rendered }))
            }
        }
    }

    async fn patch_lead(
        &self,
        tenant_id: TenantId,
        lead_id: LeadId,
        patch: LeadPatch,
    ) -> Result<Lead, ActionError> {
        self.leads
            .update(tenant_id, lead_id, patch, self.clock.now())
            .await
            .map_err(|err| lead_error(lead_id, err))
    }
}

fn lead_error(lead_id: LeadId, err: LeadflowError) -> ActionError {
    match err {
        LeadflowError::NotFound(_) => ActionError::LeadNotFound(lead_id),
        other => ActionError::Store(other),
    }
}

impl<R, L, E, N, C> ExecutionRunner for ActionExecutor<R, L, E, N, C>
where
    R: RuleRepository + Send + Sync + 'static,
    L: LeadRepository + Send + Sync + 'static,
    E: ExecutionStore + Send + Sync + 'static,
    N: Notifier + 'static,
    C: Clock + 'static,
{
    fn run(
        &self,
        tenant_id: TenantId,
        execution_id: ExecutionId,
    ) -> impl Future<Output = Result<RunOutcome, LeadflowError>> + Send {
        ActionExecutor::run(self, tenant_id, execution_id)
    }

    async fn abandon(
        &self,
        tenant_id: TenantId,
        execution_id: ExecutionId,
        reason: String,
    ) -> Result<bool, LeadflowError> {
        ActionExecutor::abandon(self, tenant_id, execution_id, &reason).await
    }
}
