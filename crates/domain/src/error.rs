//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`LeadflowError`] via `#[from]`. Storage adapters box their own error
//! enums into [`LeadflowError::Storage`].

use crate::automation::ExecutionStatus;

/// Top-level error for every port and use case.
#[derive(Debug, thiserror::Error)]
pub enum LeadflowError {
    /// A domain invariant was violated at a creation/scheduling boundary.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A record addressed by id does not exist (within the caller's tenant).
    #[error("not found: {0}")]
    NotFound(#[from] NotFoundError),

    /// An execution status change would regress the state machine.
    #[error("invalid transition: {0}")]
    Transition(#[from] TransitionError),

    /// A rule condition could not be evaluated.
    #[error("condition error: {0}")]
    Condition(#[from] ConditionError),

    /// A notification could not be delivered.
    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),

    /// The persistence layer failed.
    #[error("storage error: {0}")]
    Storage(Box<dyn std::error::Error + Send + Sync>),
}

/// Invariant violations rejected before anything is persisted or scheduled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("an active rule needs at least one action")]
    NoActions,

    #[error("invalid schedule expression {expression:?}: {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("unknown time zone {0:?}")]
    InvalidTimezone(String),

    #[error("max_retries must be at least 1")]
    ZeroMaxRetries,

    #[error("invalid job configuration: {0}")]
    InvalidJobConfig(&'static str),

    #[error("invalid action configuration: {0}")]
    InvalidAction(&'static str),

    #[error("delay of {0}s exceeds the 100 year maximum")]
    DelayTooLong(u64),

    #[error("job {0} is not active")]
    InactiveJob(String),
}

/// A lookup by id found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// An attempted status change that the execution state machine forbids.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot move execution from {from} to {to}")]
pub struct TransitionError {
    pub from: ExecutionStatus,
    pub to: ExecutionStatus,
}

/// A malformed condition, isolated to the rule that owns it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    #[error("condition field path is empty")]
    EmptyField,

    #[error("condition field path {0:?} has an empty segment")]
    EmptySegment(String),

    #[error("`in` condition on {0:?} has no candidate values")]
    EmptyCandidates(String),
}

/// The notification sink refused or failed to deliver a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not notify {recipient}: {reason}")]
pub struct NotifyError {
    pub recipient: String,
    pub reason: String,
}
