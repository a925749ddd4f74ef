use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dropflow_core::{
    Address, CancelOutcome, LineItem, ProductPage, ShippingRate, VendorAdapter, VendorError,
    VendorOrderReceipt, VendorOrderRequest, VendorOrderStatus, VendorProduct,
};
use tracing::debug;

/// Deterministic in-memory vendor.
///
/// Implements the full capability contract with no I/O, so it serves both as
/// a test stand-in and as a reference for what adapters must produce. It is
/// registered through the same registry as production adapters and is fully
/// interchangeable with them.
pub struct StaticVendorAdapter {
    id_prefix: String,
    page_size: usize,
    base_shipping_cents: i64,
    per_item_shipping_cents: i64,
    eta_days: u32,
    products: Mutex<Vec<VendorProduct>>,
    orders: Mutex<HashMap<String, VendorOrderStatus>>,
    failure_script: Mutex<VecDeque<VendorError>>,
    next_order_seq: AtomicU64,
}

impl StaticVendorAdapter {
    pub fn new(id_prefix: &str) -> Self {
        Self {
            id_prefix: id_prefix.to_string(),
            page_size: 50,
            base_shipping_cents: 500,
            per_item_shipping_cents: 150,
            eta_days: 7,
            products: Mutex::new(Vec::new()),
            orders: Mutex::new(HashMap::new()),
            failure_script: Mutex::new(VecDeque::new()),
            next_order_seq: AtomicU64::new(1),
        }
    }

    pub fn with_products(self, products: Vec<VendorProduct>) -> Self {
        *self.products.lock().expect("products lock poisoned") = products;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_shipping(mut self, base_cents: i64, per_item_cents: i64, eta_days: u32) -> Self {
        self.base_shipping_cents = base_cents;
        self.per_item_shipping_cents = per_item_cents;
        self.eta_days = eta_days;
        self
    }

    /// Queue failures to be returned by upcoming `create_order` calls.
    pub fn script_failures(&self, failures: Vec<VendorError>) {
        self.failure_script
            .lock()
            .expect("script lock poisoned")
            .extend(failures);
    }

    /// Replace the product feed, simulating vendor-side catalog drift.
    pub fn set_products(&self, products: Vec<VendorProduct>) {
        *self.products.lock().expect("products lock poisoned") = products;
    }

    /// Drive the vendor-side lifecycle for an accepted order.
    pub fn set_order_status(&self, vendor_order_id: &str, status: VendorOrderStatus) {
        self.orders
            .lock()
            .expect("orders lock poisoned")
            .insert(vendor_order_id.to_string(), status);
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().expect("orders lock poisoned").len()
    }
}

#[async_trait]
impl VendorAdapter for StaticVendorAdapter {
    async fn create_order(
        &self,
        request: &VendorOrderRequest,
    ) -> Result<VendorOrderReceipt, VendorError> {
        if let Some(failure) = self
            .failure_script
            .lock()
            .expect("script lock poisoned")
            .pop_front()
        {
            return Err(failure);
        }

        {
            let products = self.products.lock().expect("products lock poisoned");
            for item in &request.items {
                let product = products
                    .iter()
                    .find(|p| p.vendor_product_id == item.vendor_product_id)
                    .ok_or_else(|| {
                        VendorError::Permanent(format!(
                            "unknown product: {}",
                            item.vendor_product_id
                        ))
                    })?;
                if !product.in_stock {
                    return Err(VendorError::Permanent(format!(
                        "out of stock: {}",
                        item.vendor_product_id
                    )));
                }
            }
        }

        let seq = self.next_order_seq.fetch_add(1, Ordering::SeqCst);
        let vendor_order_id = format!("{}-{}", self.id_prefix, seq);
        self.orders
            .lock()
            .expect("orders lock poisoned")
            .insert(vendor_order_id.clone(), VendorOrderStatus::Accepted);

        debug!(vendor_order_id = %vendor_order_id, reference = %request.reference,
            "static vendor accepted order");
        Ok(VendorOrderReceipt {
            vendor_order_id,
            tracking_number: None,
            estimated_delivery: None,
        })
    }

    async fn get_order_status(
        &self,
        vendor_order_id: &str,
    ) -> Result<VendorOrderStatus, VendorError> {
        Ok(self
            .orders
            .lock()
            .expect("orders lock poisoned")
            .get(vendor_order_id)
            .cloned()
            .unwrap_or(VendorOrderStatus::Unknown))
    }

    async fn cancel_order(&self, vendor_order_id: &str) -> Result<CancelOutcome, VendorError> {
        let mut orders = self.orders.lock().expect("orders lock poisoned");
        match orders.get(vendor_order_id) {
            Some(VendorOrderStatus::Shipped { .. }) | Some(VendorOrderStatus::Delivered) => {
                Ok(CancelOutcome::AlreadyShipped)
            }
            Some(_) => {
                orders.insert(vendor_order_id.to_string(), VendorOrderStatus::Cancelled);
                Ok(CancelOutcome::Cancelled)
            }
            None => Err(VendorError::Permanent(format!(
                "unknown vendor order: {vendor_order_id}"
            ))),
        }
    }

    async fn list_products(&self, page_token: Option<&str>) -> Result<ProductPage, VendorError> {
        let products = self.products.lock().expect("products lock poisoned");
        let offset: usize = match page_token {
            Some(token) => token
                .parse()
                .map_err(|_| VendorError::Permanent(format!("bad page token: {token}")))?,
            None => 0,
        };

        let items: Vec<VendorProduct> = products
            .iter()
            .skip(offset)
            .take(self.page_size)
            .cloned()
            .collect();
        let next_offset = offset + items.len();
        let next_page_token = if next_offset < products.len() {
            Some(next_offset.to_string())
        } else {
            None
        };

        Ok(ProductPage {
            items,
            next_page_token,
        })
    }

    async fn quote_shipping(
        &self,
        items: &[LineItem],
        _destination: &Address,
    ) -> Result<ShippingRate, VendorError> {
        let unit_count: i64 = items.iter().map(|i| i64::from(i.quantity)).sum();
        Ok(ShippingRate {
            cost_cents: self.base_shipping_cents + self.per_item_shipping_cents * unit_count,
            currency: "USD".into(),
            eta_days: self.eta_days,
        })
    }
}
