//! Automation execution — one recorded attempt to run a rule's actions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransitionError;
use crate::id::{ExecutionId, LeadId, RuleId, TenantId};
use crate::time::Timestamp;

/// Lifecycle of an execution record.
///
/// ```text
/// pending ──► running ──► completed
///    │                └─► failed
///    └──► skipped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl ExecutionStatus {
    /// Stable storage/wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Whether `self → next` is a legal forward move.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Skipped)
                | (Self::Running, Self::Completed | Self::Failed)
        )
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(Value::String(s.to_string()))
    }
}

/// Outcome of one action inside an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Position of the action in the rule's list.
    pub index: usize,
    pub kind: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    #[must_use]
    pub fn succeeded(index: usize, kind: &str, output: Value) -> Self {
        Self {
            index,
            kind: kind.to_string(),
            success: true,
            output: Some(output),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(index: usize, kind: &str, error: impl Into<String>) -> Self {
        Self {
            index,
            kind: kind.to_string(),
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

/// A scheduled or finished run of an [`AutomationRule`](super::AutomationRule).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationExecution {
    pub id: ExecutionId,
    pub tenant_id: TenantId,
    pub rule_id: RuleId,
    pub subject_id: Option<LeadId>,
    /// Copy of the trigger payload taken at schedule time.
    pub trigger_data: Value,
    pub scheduled_for: Timestamp,
    pub executed_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    pub status: ExecutionStatus,
    pub actions_completed: u32,
    pub actions_total: u32,
    pub error_message: Option<String>,
    pub action_results: Vec<ActionResult>,
    pub created_at: Timestamp,
}

impl AutomationExecution {
    /// A fresh `pending` execution.
    #[must_use]
    pub fn pending(
        tenant_id: TenantId,
        rule_id: RuleId,
        subject_id: Option<LeadId>,
        trigger_data: Value,
        actions_total: u32,
        scheduled_for: Timestamp,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: ExecutionId::new(),
            tenant_id,
            rule_id,
            subject_id,
            trigger_data,
            scheduled_for,
            executed_at: None,
            finished_at: None,
            status: ExecutionStatus::Pending,
            actions_completed: 0,
            actions_total,
            error_message: None,
            action_results: Vec::new(),
            created_at,
        }
    }

    /// Whether a `pending` execution may be dispatched at `now`.
    #[must_use]
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.status == ExecutionStatus::Pending && self.scheduled_for <= now
    }

    /// Move to `next`, refusing regressions.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the state machine forbids the move.
    pub fn transition(&mut self, next: ExecutionStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Append an action outcome. Only successes advance `actions_completed`,
    /// which never exceeds `actions_total`.
    pub fn record_action(&mut self, result: ActionResult) {
        if result.success && self.actions_completed < self.actions_total {
            self.actions_completed += 1;
        }
        self.action_results.push(result);
    }

    /// Number of actions that were attempted, successful or not.
    #[must_use]
    pub fn actions_attempted(&self) -> usize {
        self.action_results.len()
    }

    /// Finish as `completed`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless the execution is `running`.
    pub fn complete(&mut self, at: Timestamp) -> Result<(), TransitionError> {
        self.transition(ExecutionStatus::Completed)?;
        self.finished_at = Some(at);
        Ok(())
    }

    /// Finish as `failed` with the machinery error that stopped it.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless the execution is `running`.
    pub fn fail(&mut self, at: Timestamp, message: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(ExecutionStatus::Failed)?;
        self.finished_at = Some(at);
        self.error_message = Some(message.into());
        Ok(())
    }
}
