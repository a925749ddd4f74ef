use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dropflow_catalog::{CatalogEntry, CatalogStore};
use dropflow_core::StoreError;
use dropflow_order::models::OrderState;
use dropflow_order::{FulfillmentOrder, OrderStore};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory order store for development and tests.
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<Uuid, FulfillmentOrder>>,
    by_key: RwLock<HashMap<String, Uuid>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            by_key: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: &FulfillmentOrder) -> Result<(), StoreError> {
        let mut by_key = self.by_key.write().await;
        if by_key.contains_key(&order.idempotency_key) {
            return Err(
                format!("duplicate idempotency key: {}", order.idempotency_key).into(),
            );
        }
        by_key.insert(order.idempotency_key.clone(), order.id);
        self.orders.write().await.insert(order.id, order.clone());
        Ok(())
    }

    async fn update(&self, order: &FulfillmentOrder) -> Result<(), StoreError> {
        let mut orders = self.orders.write().await;
        if !orders.contains_key(&order.id) {
            return Err(format!("unknown order: {}", order.id).into());
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<FulfillmentOrder>, StoreError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn get_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<FulfillmentOrder>, StoreError> {
        let id = match self.by_key.read().await.get(key) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn list(&self, vendor_id: Option<&str>) -> Result<Vec<FulfillmentOrder>, StoreError> {
        let mut orders: Vec<FulfillmentOrder> = self
            .orders
            .read()
            .await
            .values()
            .filter(|o| vendor_id.map(|v| o.vendor_id == v).unwrap_or(true))
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn list_submitting_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<FulfillmentOrder>, StoreError> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .filter(|o| o.state == OrderState::Submitting && o.updated_at < cutoff)
            .cloned()
            .collect())
    }
}

/// In-memory catalog store keyed by (vendor_id, vendor_product_id).
pub struct MemoryCatalogStore {
    entries: RwLock<HashMap<(String, String), CatalogEntry>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn upsert(&self, entry: &CatalogEntry) -> Result<(), StoreError> {
        self.entries.write().await.insert(
            (entry.vendor_id.clone(), entry.vendor_product_id.clone()),
            entry.clone(),
        );
        Ok(())
    }

    async fn get(
        &self,
        vendor_id: &str,
        vendor_product_id: &str,
    ) -> Result<Option<CatalogEntry>, StoreError> {
        Ok(self
            .entries
            .read()
            .await
            .get(&(vendor_id.to_string(), vendor_product_id.to_string()))
            .cloned())
    }

    async fn list_for_vendor(
        &self,
        vendor_id: &str,
        include_inactive: bool,
    ) -> Result<Vec<CatalogEntry>, StoreError> {
        let mut entries: Vec<CatalogEntry> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.vendor_id == vendor_id && (include_inactive || e.active))
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.vendor_product_id.cmp(&b.vendor_product_id));
        Ok(entries)
    }

    async fn set_active(
        &self,
        vendor_id: &str,
        vendor_product_id: &str,
        active: bool,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&(vendor_id.to_string(), vendor_product_id.to_string())) {
            Some(entry) => {
                entry.active = active;
                Ok(())
            }
            None => Err(format!(
                "unknown catalog entry: {vendor_id}/{vendor_product_id}"
            )
            .into()),
        }
    }
}
