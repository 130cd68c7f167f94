//! Action — one unit of work applied to a lead when a rule fires.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// The closed set of things a rule can do.
///
/// Unknown `type` tags fail deserialization, so an unsupported action is a
/// construction-time error rather than a silent runtime no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    UpdateStatus { status: String },
    MoveStage { stage: String },
    AddTag { tag: String },
    RemoveTag { tag: String },
    /// Write a custom field on the lead.
    UpdateField { field: String, value: Value },
    /// Send `message` to `recipient`. `{{field}}` placeholders are filled from
    /// the trigger payload.
    Notify { recipient: String, message: String },
}

impl Action {
    /// Short kind name recorded in per-action results.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpdateStatus { .. } => "update_status",
            Self::MoveStage { .. } => "move_stage",
            Self::AddTag { .. } => "add_tag",
            Self::RemoveTag { .. } => "remove_tag",
            Self::UpdateField { .. } => "update_field",
            Self::Notify { .. } => "notify",
        }
    }

    /// Whether the action operates on the execution's subject lead.
    #[must_use]
    pub fn needs_subject(&self) -> bool {
        !matches!(self, Self::Notify { .. })
    }

    /// Reject configs that could never succeed.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidAction`] on blank targets.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let blank = match self {
            Self::UpdateStatus { status } => status.trim().is_empty(),
            Self::MoveStage { stage } => stage.trim().is_empty(),
            Self::AddTag { tag } | Self::RemoveTag { tag } => tag.trim().is_empty(),
            Self::UpdateField { field, .. } => field.trim().is_empty(),
            Self::Notify { recipient, .. } => recipient.trim().is_empty(),
        };
        if blank {
            return Err(ValidationError::InvalidAction(self.kind()));
        }
        Ok(())
    }
}

/// Replace `{{path}}` placeholders with values from `data`.
///
/// String values are inserted verbatim, other JSON values in their compact
/// form; unknown placeholders become empty.
#[must_use]
pub fn render_template(template: &str, data: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = after[..end].trim();
        let value = key
            .split('.')
            .try_fold(data, |current, segment| current.get(segment));
        match value {
            Some(Value::String(s)) => out.push_str(s),
            Some(Value::Null) | None => {}
            Some(other) => out.push_str(&other.to_string()),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UpdateStatus { status } => write!(f, "update_status({status})"),
            Self::MoveStage { stage } => write!(f, "move_stage({stage})"),
            Self::AddTag { tag } => write!(f, "add_tag({tag})"),
            Self::RemoveTag { tag } => write!(f, "remove_tag({tag})"),
            Self::UpdateField { field, .. } => write!(f, "update_field({field})"),
            Self::Notify { recipient, .. } => write!(f, "notify({recipient})"),
        }
    }
}
