//! Condition — a structural guard over the trigger payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConditionError;

/// A predicate over one named payload field.
///
/// Field names may be dotted paths (`"lead.platform"`) into nested objects.
/// All conditions of a rule must hold (logical AND); an empty list matches
/// every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// The field is present and equal to `value`.
    Equals { field: String, value: Value },
    /// The field is absent or differs from `value`.
    NotEquals { field: String, value: Value },
    /// The field is present and equal to one of `values`.
    In { field: String, values: Vec<Value> },
    /// The field is present and not `null`.
    Exists { field: String },
}

impl Condition {
    /// Shorthand for the common `field == value` check.
    #[must_use]
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    fn field(&self) -> &str {
        match self {
            Self::Equals { field, .. }
            | Self::NotEquals { field, .. }
            | Self::In { field, .. }
            | Self::Exists { field } => field,
        }
    }

    /// Evaluate against a payload. Pure: reads the payload only.
    ///
    /// # Errors
    ///
    /// Returns [`ConditionError`] when the condition itself is malformed
    /// (empty path, empty path segment, `in` without candidates).
    pub fn evaluate(&self, payload: &Value) -> Result<bool, ConditionError> {
        let actual = lookup(payload, self.field())?;
        let matched = match self {
            Self::Equals { value, .. } => actual == Some(value),
            Self::NotEquals { value, .. } => actual != Some(value),
            Self::In { field, values } => {
                if values.is_empty() {
                    return Err(ConditionError::EmptyCandidates(field.clone()));
                }
                actual.is_some_and(|v| values.contains(v))
            }
            Self::Exists { .. } => actual.is_some_and(|v| !v.is_null()),
        };
        Ok(matched)
    }
}

/// Evaluate a condition set, short-circuiting on the first clause that fails
/// or errors.
///
/// # Errors
///
/// Propagates the first [`ConditionError`] encountered before a failing clause.
pub fn evaluate_all(conditions: &[Condition], payload: &Value) -> Result<bool, ConditionError> {
    for condition in conditions {
        if !condition.evaluate(payload)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn lookup<'a>(payload: &'a Value, path: &str) -> Result<Option<&'a Value>, ConditionError> {
    if path.is_empty() {
        return Err(ConditionError::EmptyField);
    }
    let mut current = payload;
    for segment in path.split('.') {
        if segment.is_empty() {
            return Err(ConditionError::EmptySegment(path.to_string()));
        }
        match current.get(segment) {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Equals { field, value } => write!(f, "{field} == {value}"),
            Self::NotEquals { field, value } => write!(f, "{field} != {value}"),
            Self::In { field, values } => {
                write!(f, "{field} in {}", Value::Array(values.clone()))
            }
            Self::Exists { field } => write!(f, "exists({field})"),
        }
    }
}
