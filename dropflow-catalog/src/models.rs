use chrono::{DateTime, Utc};
use dropflow_core::VendorProduct;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One vendor-backed product in the local catalog.
///
/// Vendor-namespaced: (vendor_id, vendor_product_id) is the natural key, and
/// the same local product id may be backed by multiple vendors. Entries are
/// deactivated, never deleted, so existing orders keep their references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub vendor_id: String,
    pub vendor_product_id: String,
    pub local_product_id: Uuid,
    pub name: String,
    pub price_cents: i64,
    pub currency: String,
    pub in_stock: bool,
    pub stock_quantity: Option<i64>,
    pub active: bool,
    pub last_synced_at: DateTime<Utc>,
}

impl CatalogEntry {
    /// Build a fresh active entry from a vendor feed item.
    pub fn from_vendor_product(vendor_id: &str, product: &VendorProduct) -> Self {
        Self {
            vendor_id: vendor_id.to_string(),
            vendor_product_id: product.vendor_product_id.clone(),
            local_product_id: Uuid::new_v4(),
            name: product.name.clone(),
            price_cents: product.price_cents,
            currency: product.currency.clone(),
            in_stock: product.in_stock,
            stock_quantity: product.stock_quantity,
            active: true,
            last_synced_at: Utc::now(),
        }
    }

    /// Fold the latest feed values into an existing entry, reporting whether
    /// anything material changed.
    pub fn absorb(&mut self, product: &VendorProduct) -> bool {
        let changed = self.name != product.name
            || self.price_cents != product.price_cents
            || self.currency != product.currency
            || self.in_stock != product.in_stock
            || self.stock_quantity != product.stock_quantity
            || !self.active;

        self.name = product.name.clone();
        self.price_cents = product.price_cents;
        self.currency = product.currency.clone();
        self.in_stock = product.in_stock;
        self.stock_quantity = product.stock_quantity;
        self.active = true;
        self.last_synced_at = Utc::now();
        changed
    }
}

/// Result of one vendor sync run, returned to the caller and logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub vendor_id: String,
    pub inserted: u32,
    pub updated: u32,
    pub deactivated: u32,
    pub errors: Vec<String>,
    /// True when pagination aborted mid-run; earlier pages were still
    /// reconciled and nothing was rolled back.
    pub partial: bool,
}

impl SyncOutcome {
    pub fn new(vendor_id: &str) -> Self {
        Self {
            vendor_id: vendor_id.to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_item(id: &str, price: i64) -> VendorProduct {
        VendorProduct {
            vendor_product_id: id.to_string(),
            name: format!("Product {id}"),
            price_cents: price,
            currency: "USD".into(),
            in_stock: true,
            stock_quantity: Some(5),
        }
    }

    #[test]
    fn absorb_reports_material_changes_only() {
        let item = feed_item("p1", 500);
        let mut entry = CatalogEntry::from_vendor_product("v1", &item);

        assert!(!entry.absorb(&item));

        let repriced = feed_item("p1", 750);
        assert!(entry.absorb(&repriced));
        assert_eq!(entry.price_cents, 750);
    }

    #[test]
    fn absorb_reactivates_a_deactivated_entry() {
        let item = feed_item("p1", 500);
        let mut entry = CatalogEntry::from_vendor_product("v1", &item);
        entry.active = false;

        assert!(entry.absorb(&item));
        assert!(entry.active);
    }
}
