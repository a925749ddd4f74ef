use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dropflow_core::StoreError;
use uuid::Uuid;

use crate::models::FulfillmentOrder;

/// Persistence seam for fulfillment orders.
///
/// Implementations must enforce uniqueness of the idempotency key on insert.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new record. Fails if the idempotency key already exists.
    async fn insert(&self, order: &FulfillmentOrder) -> Result<(), StoreError>;

    async fn update(&self, order: &FulfillmentOrder) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<FulfillmentOrder>, StoreError>;

    async fn get_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<FulfillmentOrder>, StoreError>;

    async fn list(&self, vendor_id: Option<&str>) -> Result<Vec<FulfillmentOrder>, StoreError>;

    /// Orders stuck in `Submitting` since before `cutoff`, for the watchdog.
    async fn list_submitting_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<FulfillmentOrder>, StoreError>;
}
