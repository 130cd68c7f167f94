//! Lead — the subject that automations and jobs act upon.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LeadflowError, ValidationError};
use crate::id::{LeadId, TenantId};
use crate::time::{self, Timestamp};

/// Status given to leads created without one.
pub const DEFAULT_STATUS: &str = "new";

/// A sales lead owned by one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub tenant_id: TenantId,
    pub name: String,
    pub email: Option<String>,
    /// Acquisition platform, e.g. `"google"`.
    pub platform: Option<String>,
    pub status: String,
    /// Kanban stage.
    pub stage: Option<String>,
    pub tags: BTreeSet<String>,
    /// Free-form custom fields.
    pub fields: Map<String, Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Lead {
    /// Create a builder for constructing a [`Lead`].
    #[must_use]
    pub fn builder() -> LeadBuilder {
        LeadBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`LeadflowError::Validation`] when `name` is empty.
    pub fn validate(&self) -> Result<(), LeadflowError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }

    /// Apply a partial update, bumping `updated_at`.
    pub fn apply(&mut self, patch: LeadPatch, at: Timestamp) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(stage) = patch.stage {
            self.stage = Some(stage);
        }
        self.fields.extend(patch.fields);
        self.updated_at = at;
    }

    /// The lead as a trigger payload.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        serde_json::json!({
            "lead_id": self.id,
            "name": self.name,
            "email": self.email,
            "platform": self.platform,
            "status": self.status,
            "stage": self.stage,
            "tags": self.tags,
            "fields": self.fields,
        })
    }
}

/// Partial lead update. `None`/empty members are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadPatch {
    pub status: Option<String>,
    pub stage: Option<String>,
    pub fields: Map<String, Value>,
}

impl LeadPatch {
    #[must_use]
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn stage(stage: impl Into<String>) -> Self {
        Self {
            stage: Some(stage.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn field(name: impl Into<String>, value: Value) -> Self {
        let mut fields = Map::new();
        fields.insert(name.into(), value);
        Self {
            fields,
            ..Self::default()
        }
    }
}

/// Query used by recurring jobs to select leads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadFilter {
    pub status: Option<String>,
    pub stage: Option<String>,
    /// Only leads not touched since this instant.
    pub updated_before: Option<Timestamp>,
    /// Only leads created at or after this instant.
    pub created_since: Option<Timestamp>,
}

impl LeadFilter {
    /// Whether `lead` satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, lead: &Lead) -> bool {
        self.status.as_ref().is_none_or(|s| *s == lead.status)
            && self
                .stage
                .as_ref()
                .is_none_or(|s| lead.stage.as_ref() == Some(s))
            && self.updated_before.is_none_or(|ts| lead.updated_at < ts)
            && self.created_since.is_none_or(|ts| lead.created_at >= ts)
    }
}

/// Step-by-step builder for [`Lead`].
#[derive(Debug, Default)]
pub struct LeadBuilder {
    id: Option<LeadId>,
    tenant_id: Option<TenantId>,
    name: Option<String>,
    email: Option<String>,
    platform: Option<String>,
    status: Option<String>,
    stage: Option<String>,
    tags: BTreeSet<String>,
    created_at: Option<Timestamp>,
}

impl LeadBuilder {
    #[must_use]
    pub fn id(mut self, id: LeadId) -> Self {
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
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    #[must_use]
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    #[must_use]
    pub fn stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Sets both `created_at` and `updated_at`.
    #[must_use]
    pub fn created_at(mut self, ts: Timestamp) -> Self {
        self.created_at = Some(ts);
        self
    }

    /// Consume the builder, validate, and return a [`Lead`].
    ///
    /// # Errors
    ///
    /// Returns [`LeadflowError::Validation`] if `name` is missing or empty.
    pub fn build(self) -> Result<Lead, LeadflowError> {
        let created_at = self.created_at.unwrap_or_else(time::now);
        let lead = Lead {
            id: self.id.unwrap_or_default(),
            tenant_id: self.tenant_id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            email: self.email,
            platform: self.platform,
            status: self.status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            stage: self.stage,
            tags: self.tags,
            fields: Map::new(),
            created_at,
            updated_at: created_at,
        };
        lead.validate()?;
        Ok(lead)
    }
}
