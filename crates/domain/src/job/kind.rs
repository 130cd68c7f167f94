//! Job kinds — the closed set of recurring work and its per-kind config.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// What a recurring job does when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    /// Re-status and/or tag leads stuck in `status` for `idle_days`.
    StaleLeadSweep {
        status: String,
        idle_days: u32,
        #[serde(default)]
        set_status: Option<String>,
        #[serde(default)]
        add_tag: Option<String>,
    },
    /// Delete the tenant's finished execution records older than
    /// `retain_days`.
    ExecutionCleanup { retain_days: u32 },
    /// Notify `recipient` once per lead without activity for `idle_hours`.
    FollowUpReminder {
        #[serde(default)]
        stage: Option<String>,
        #[serde(default)]
        status: Option<String>,
        idle_hours: u32,
        recipient: String,
    },
    /// Send `recipient` a summary of leads created in the last
    /// `window_hours`.
    LeadDigest { recipient: String, window_hours: u32 },
}

impl JobKind {
    /// Stable storage/wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StaleLeadSweep { .. } => "stale_lead_sweep",
            Self::ExecutionCleanup { .. } => "execution_cleanup",
            Self::FollowUpReminder { .. } => "follow_up_reminder",
            Self::LeadDigest { .. } => "lead_digest",
        }
    }

    /// Check the kind-specific config.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidJobConfig`] describing the first
    /// problem found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::StaleLeadSweep {
                status,
                idle_days,
                set_status,
                add_tag,
            } => {
                if status.trim().is_empty() {
                    return Err(ValidationError::InvalidJobConfig("sweep status is empty"));
                }
                if *idle_days == 0 {
                    return Err(ValidationError::InvalidJobConfig("idle_days must be positive"));
                }
                if set_status.is_none() && add_tag.is_none() {
                    return Err(ValidationError::InvalidJobConfig(
                        "sweep needs set_status or add_tag",
                    ));
                }
            }
            Self::ExecutionCleanup { retain_days } => {
                if *retain_days == 0 {
                    return Err(ValidationError::InvalidJobConfig(
                        "retain_days must be positive",
                    ));
                }
            }
            Self::FollowUpReminder {
                idle_hours,
                recipient,
                ..
            } => {
                if *idle_hours == 0 {
                    return Err(ValidationError::InvalidJobConfig("idle_hours must be positive"));
                }
                if recipient.trim().is_empty() {
                    return Err(ValidationError::InvalidJobConfig("recipient is empty"));
                }
            }
            Self::LeadDigest {
                recipient,
                window_hours,
            } => {
                if *window_hours == 0 {
                    return Err(ValidationError::InvalidJobConfig(
                        "window_hours must be positive",
                    ));
                }
                if recipient.trim().is_empty() {
                    return Err(ValidationError::InvalidJobConfig("recipient is empty"));
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
