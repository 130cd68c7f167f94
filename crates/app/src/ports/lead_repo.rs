//! Lead repository port — the subjects acted upon by rules and jobs.

use std::future::Future;
use std::sync::Arc;

use leadflow_domain::error::LeadflowError;
use leadflow_domain::id::{LeadId, TenantId};
use leadflow_domain::lead::{Lead, LeadFilter, LeadPatch};
use leadflow_domain::time::Timestamp;

/// Repository for reading and mutating [`Lead`]s.
pub trait LeadRepository {
    /// Create a new lead in storage.
    fn create(&self, lead: Lead) -> impl Future<Output = Result<Lead, LeadflowError>> + Send;

    /// Get a lead of `tenant_id` by its identifier.
    fn get_by_id(
        &self,
        tenant_id: TenantId,
        id: LeadId,
    ) -> impl Future<Output = Result<Option<Lead>, LeadflowError>> + Send;

    /// Apply a partial update and return the updated lead.
    ///
    /// Fails with [`LeadflowError::NotFound`] when the lead does not exist.
    fn update(
        &self,
        tenant_id: TenantId,
        id: LeadId,
        patch: LeadPatch,
        at: Timestamp,
    ) -> impl Future<Output = Result<Lead, LeadflowError>> + Send;

    /// Attach a tag. Returns `false` if the lead already carried it.
    fn add_tag(
        &self,
        tenant_id: TenantId,
        id: LeadId,
        tag: String,
    ) -> impl Future<Output = Result<bool, LeadflowError>> + Send;

    /// Detach a tag. Returns `false` if the lead did not carry it.
    fn remove_tag(
        &self,
        tenant_id: TenantId,
        id: LeadId,
        tag: String,
    ) -> impl Future<Output = Result<bool, LeadflowError>> + Send;

    /// A tenant's leads matching `filter`, oldest first.
    fn find(
        &self,
        tenant_id: TenantId,
        filter: LeadFilter,
    ) -> impl Future<Output = Result<Vec<Lead>, LeadflowError>> + Send;
}

impl<T: LeadRepository + Send + Sync> LeadRepository for Arc<T> {
    fn create(&self, lead: Lead) -> impl Future<Output = Result<Lead, LeadflowError>> + Send {
        (**self).create(lead)
    }

    fn get_by_id(
        &self,
        tenant_id: TenantId,
        id: LeadId,
    ) -> impl Future<Output = Result<Option<Lead>, LeadflowError>> + Send {
        (**self).get_by_id(tenant_id, id)
    }

    fn update(
        &self,
        tenant_id: TenantId,
        id: LeadId,
        patch: LeadPatch,
        at: Timestamp,
    ) -> impl Future<Output = Result<Lead, LeadflowError>> + Send {
        (**self).update(tenant_id, id, patch, at)
    }

    fn add_tag(
        &self,
        tenant_id: TenantId,
        id: LeadId,
        tag: String,
    ) -> impl Future<Output = Result<bool, LeadflowError>> + Send {
        (**self).add_tag(tenant_id, id, tag)
    }

    fn remove_tag(
        &self,
        tenant_id: TenantId,
        id: LeadId,
        tag: String,
    ) -> impl Future<Output = Result<bool, LeadflowError>> + Send {
        (**self).remove_tag(tenant_id, id, tag)
    }

    fn find(
        &self,
        tenant_id: TenantId,
        filter: LeadFilter,
    ) -> impl Future<Output = Result<Vec<Lead>, LeadflowError>> + Send {
        (**self).find(tenant_id, filter)
    }
}
