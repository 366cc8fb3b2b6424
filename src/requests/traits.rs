// Collaborator interfaces injected into the workflow engine

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::errors::{CartError, IdentityError, StoreError};
use super::types::{Actor, CartLineItem, FabricationRequest, RequestId, Stage};

/// Persistence boundary for fabrication requests
///
/// Every mutation goes through [`RequestStore::compare_and_swap`], which only
/// succeeds when the stored revision still matches the one the caller read.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Insert a brand new record
    async fn insert(&self, request: FabricationRequest) -> Result<(), StoreError>;

    /// Load a record by id
    async fn get(&self, id: RequestId) -> Result<Option<FabricationRequest>, StoreError>;

    /// All records currently in `stage`, in no particular order
    async fn list_by_stage(&self, stage: Stage) -> Result<Vec<FabricationRequest>, StoreError>;

    /// Replace the record if its stored version equals `expected_version`
    ///
    /// Fails with [`StoreError::VersionConflict`] when another writer got
    /// there first and [`StoreError::NotFound`] when the id is unknown.
    async fn compare_and_swap(
        &self,
        expected_version: u64,
        updated: FabricationRequest,
    ) -> Result<(), StoreError>;
}

/// Cart subsystem that owns line items after hand-off
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CartService: Send + Sync {
    async fn add_line_item(&self, item: CartLineItem) -> Result<(), CartError>;
}

/// Supplies the role of the acting user
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn resolve(&self, user_id: &str) -> Result<Actor, IdentityError>;
}
