// In-process collaborators, used by tests and embedding callers

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};

use super::errors::{CartError, StoreError};
use super::traits::{CartService, RequestStore};
use super::types::{CartLineItem, FabricationRequest, RequestId, Stage};

/// Request store kept in a map behind an async lock
#[derive(Debug, Default)]
pub struct InMemoryRequestStore {
    records: RwLock<HashMap<RequestId, FabricationRequest>>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records
    pub fn with_records(records: impl IntoIterator<Item = FabricationRequest>) -> Self {
        let records = records.into_iter().map(|r| (r.id, r)).collect();
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn insert(&self, request: FabricationRequest) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&request.id) {
            return Err(StoreError::Duplicate(request.id));
        }
        records.insert(request.id, request);
        Ok(())
    }

    async fn get(&self, id: RequestId) -> Result<Option<FabricationRequest>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn list_by_stage(&self, stage: Stage) -> Result<Vec<FabricationRequest>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.status == stage)
            .cloned()
            .collect())
    }

    async fn compare_and_swap(
        &self,
        expected_version: u64,
        updated: FabricationRequest,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let current = records
            .get_mut(&updated.id)
            .ok_or(StoreError::NotFound(updated.id))?;
        if current.version != expected_version {
            return Err(StoreError::VersionConflict {
                id: updated.id,
                expected: expected_version,
                found: current.version,
            });
        }
        *current = updated;
        Ok(())
    }
}

/// Cart that just collects the line items it is handed
#[derive(Debug, Default)]
pub struct InMemoryCart {
    items: Mutex<Vec<CartLineItem>>,
}

impl InMemoryCart {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn items(&self) -> Vec<CartLineItem> {
        self.items.lock().await.clone()
    }
}

#[async_trait]
impl CartService for InMemoryCart {
    async fn add_line_item(&self, item: CartLineItem) -> Result<(), CartError> {
        tracing::debug!(request.id = %item.request_id, total_cents = item.total_cents, "Line item added to cart");
        self.items.lock().await.push(item);
        Ok(())
    }
}
