use async_trait::async_trait;
use dropflow_core::StoreError;

use crate::models::CatalogEntry;

/// Persistence seam for catalog entries, keyed by
/// (vendor_id, vendor_product_id).
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn upsert(&self, entry: &CatalogEntry) -> Result<(), StoreError>;

    async fn get(
        &self,
        vendor_id: &str,
        vendor_product_id: &str,
    ) -> Result<Option<CatalogEntry>, StoreError>;

    async fn list_for_vendor(
        &self,
        vendor_id: &str,
        include_inactive: bool,
    ) -> Result<Vec<CatalogEntry>, StoreError>;

    async fn set_active(
        &self,
        vendor_id: &str,
        vendor_product_id: &str,
        active: bool,
    ) -> Result<(), StoreError>;
}
