//! Trigger — the event category that activates a rule.

use serde::{Deserialize, Serialize};

/// The closed set of lead events the engine listens for.
///
/// Unknown trigger names fail to deserialize, so a rule can never be stored
/// with a trigger the engine would silently ignore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    LeadCreated,
    StatusChanged,
    StageChanged,
    TagAdded,
    TagRemoved,
    FieldUpdated,
    /// Fired explicitly by an operator through the management interface.
    Manual,
}

impl TriggerType {
    /// Stable storage/wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LeadCreated => "lead_created",
            Self::StatusChanged => "status_changed",
            Self::StageChanged => "stage_changed",
            Self::TagAdded => "tag_added",
            Self::TagRemoved => "tag_removed",
            Self::FieldUpdated => "field_updated",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TriggerType {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
    }
}
