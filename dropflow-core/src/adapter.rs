use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Capabilities a vendor can declare at registration time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    OrderCreation,
    CatalogSync,
    ShippingQuote,
}

/// Registration-time profile for an external fulfillment vendor.
///
/// Profiles are soft-disabled, never deleted, while orders still reference
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorProfile {
    pub vendor_id: String,
    pub display_name: String,
    pub enabled: bool,
    pub capabilities: Vec<Capability>,
    /// Adapter-declared call timeout. The orchestrator still enforces its own
    /// hard ceiling on top of this.
    pub timeout_ms: u64,
    pub rate_limit_per_minute: Option<u32>,
}

impl VendorProfile {
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// A single vendor-scoped order line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItem {
    pub vendor_product_id: String,
    pub quantity: u32,
    /// Unit price in minor currency units.
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contact {
    pub name: String,
    pub email: String,
}

/// Normalized order payload handed to an adapter. Adapters own the
/// translation into whatever the vendor's wire format is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorOrderRequest {
    /// Local reference the vendor should echo back (the local order id).
    pub reference: String,
    pub items: Vec<LineItem>,
    pub destination: Address,
    pub buyer: Contact,
    #[serde(default)]
    pub notes: Option<String>,
}

/// What a successful order placement yields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorOrderReceipt {
    pub vendor_order_id: String,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
}

/// Normalized vendor-side order status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VendorOrderStatus {
    Accepted,
    Shipped { tracking_number: Option<String> },
    Delivered,
    Cancelled,
    Unknown,
}

/// Outcome of a cancellation attempt against the vendor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelOutcome {
    Cancelled,
    /// The vendor refused because the order already left the warehouse.
    AlreadyShipped,
}

/// One normalized product from a vendor's listing feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorProduct {
    pub vendor_product_id: String,
    pub name: String,
    pub price_cents: i64,
    pub currency: String,
    pub in_stock: bool,
    #[serde(default)]
    pub stock_quantity: Option<i64>,
}

/// A page of the vendor's product listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductPage {
    pub items: Vec<VendorProduct>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Normalized shipping quote. The aggregator pairs it with the vendor id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingRate {
    pub cost_cents: i64,
    pub currency: String,
    pub eta_days: u32,
}

/// Errors an adapter is allowed to surface.
///
/// An adapter that cannot classify a failure must default to `Transient`:
/// retrying is safer than silently dropping an order.
#[derive(Debug, thiserror::Error)]
pub enum VendorError {
    #[error("transient vendor failure: {0}")]
    Transient(String),

    #[error("vendor rejected request: {0}")]
    Permanent(String),
}

/// Uniform capability contract every vendor adapter implements.
///
/// Adapters are pure translation plus I/O; orchestration (idempotency,
/// retries, persistence) lives above this trait. Test adapters and production
/// adapters are interchangeable through the same registry.
#[async_trait]
pub trait VendorAdapter: Send + Sync {
    async fn create_order(
        &self,
        request: &VendorOrderRequest,
    ) -> Result<VendorOrderReceipt, VendorError>;

    async fn get_order_status(
        &self,
        vendor_order_id: &str,
    ) -> Result<VendorOrderStatus, VendorError>;

    async fn cancel_order(&self, vendor_order_id: &str) -> Result<CancelOutcome, VendorError>;

    async fn list_products(&self, page_token: Option<&str>) -> Result<ProductPage, VendorError>;

    async fn quote_shipping(
        &self,
        items: &[LineItem],
        destination: &Address,
    ) -> Result<ShippingRate, VendorError>;
}
