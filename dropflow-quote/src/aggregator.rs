use std::sync::Arc;
use std::time::Duration;

use dropflow_catalog::CatalogStore;
use dropflow_core::{Address, AdapterRegistry, Capability, FulfillError, LineItem};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, warn};

/// A completed quote paired with the vendor that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorQuote {
    pub vendor_id: String,
    pub cost_cents: i64,
    pub currency: String,
    pub eta_days: u32,
}

/// Result of one aggregation: whatever completed in time, plus the vendors
/// that failed or timed out. Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteOutcome {
    pub quotes: Vec<VendorQuote>,
    pub failed_vendors: Vec<String>,
}

/// Fans a shipping-cost request out to every vendor that can fulfill part of
/// the order and collects comparable quotes.
///
/// Wait-for-all-with-timeout: one slow vendor costs at most the per-adapter
/// timeout and never fails the aggregate call.
pub struct ShippingQuoteAggregator {
    registry: Arc<AdapterRegistry>,
    catalog: Arc<dyn CatalogStore>,
    /// Upper bound on any single adapter call, whatever the adapter declares.
    quote_timeout: Duration,
}

impl ShippingQuoteAggregator {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        catalog: Arc<dyn CatalogStore>,
        quote_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            catalog,
            quote_timeout,
        }
    }

    pub async fn quote(
        &self,
        items: &[LineItem],
        destination: &Address,
    ) -> Result<QuoteOutcome, FulfillError> {
        if items.is_empty() {
            return Err(FulfillError::Validation(
                "quote request must contain at least one line item".into(),
            ));
        }

        // Group items by the vendors whose active catalog carries them.
        let mut targets: Vec<(String, Vec<LineItem>)> = Vec::new();
        for vendor_id in self.registry.list_enabled(Capability::ShippingQuote) {
            let mut subset = Vec::new();
            for item in items {
                let entry = self
                    .catalog
                    .get(&vendor_id, &item.vendor_product_id)
                    .await
                    .map_err(FulfillError::storage)?;
                if entry.map(|e| e.active).unwrap_or(false) {
                    subset.push(item.clone());
                }
            }
            if !subset.is_empty() {
                targets.push((vendor_id, subset));
            }
        }

        let calls = targets.into_iter().map(|(vendor_id, subset)| {
            let registry = Arc::clone(&self.registry);
            let destination = destination.clone();
            let ceiling = self.quote_timeout;
            async move {
                let adapter = match registry.get_enabled(&vendor_id, Capability::ShippingQuote) {
                    Ok(adapter) => adapter,
                    Err(err) => {
                        warn!(vendor_id = %vendor_id, error = %err, "vendor dropped out mid-quote");
                        return (vendor_id, None);
                    }
                };
                let per_vendor = registry
                    .timeout_for(&vendor_id)
                    .map(|declared| declared.min(ceiling))
                    .unwrap_or(ceiling);

                match timeout(per_vendor, adapter.quote_shipping(&subset, &destination)).await {
                    Ok(Ok(rate)) => (
                        vendor_id.clone(),
                        Some(VendorQuote {
                            vendor_id,
                            cost_cents: rate.cost_cents,
                            currency: rate.currency,
                            eta_days: rate.eta_days,
                        }),
                    ),
                    Ok(Err(err)) => {
                        warn!(vendor_id = %vendor_id, error = %err, "shipping quote failed");
                        (vendor_id, None)
                    }
                    Err(_) => {
                        warn!(vendor_id = %vendor_id, timeout_ms = per_vendor.as_millis() as u64,
                            "shipping quote timed out");
                        (vendor_id, None)
                    }
                }
            }
        });

        let mut outcome = QuoteOutcome {
            quotes: Vec::new(),
            failed_vendors: Vec::new(),
        };
        for (vendor_id, quote) in join_all(calls).await {
            match quote {
                Some(quote) => outcome.quotes.push(quote),
                None => outcome.failed_vendors.push(vendor_id),
            }
        }

        debug!(
            quotes = outcome.quotes.len(),
            failed = outcome.failed_vendors.len(),
            "quote aggregation finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dropflow_catalog::CatalogEntry;
    use dropflow_core::{
        CancelOutcome, ProductPage, ShippingRate, StoreError, VendorAdapter, VendorError,
        VendorOrderReceipt, VendorOrderRequest, VendorOrderStatus, VendorProduct, VendorProfile,
    };
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    struct TestCatalogStore {
        entries: RwLock<HashMap<(String, String), CatalogEntry>>,
    }

    impl TestCatalogStore {
        fn new() -> Self {
            Self {
                entries: RwLock::new(HashMap::new()),
            }
        }

        async fn seed(&self, vendor_id: &str, vendor_product_id: &str) {
            let entry = CatalogEntry::from_vendor_product(
                vendor_id,
                &VendorProduct {
                    vendor_product_id: vendor_product_id.to_string(),
                    name: vendor_product_id.to_string(),
                    price_cents: 1_000,
                    currency: "USD".into(),
                    in_stock: true,
                    stock_quantity: None,
                },
            );
            self.entries.write().await.insert(
                (vendor_id.to_string(), vendor_product_id.to_string()),
                entry,
            );
        }
    }

    #[async_trait]
    impl CatalogStore for TestCatalogStore {
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
            Ok(self
                .entries
                .read()
                .await
                .values()
                .filter(|e| e.vendor_id == vendor_id && (include_inactive || e.active))
                .cloned()
                .collect())
        }

        async fn set_active(
            &self,
            vendor_id: &str,
            vendor_product_id: &str,
            active: bool,
        ) -> Result<(), StoreError> {
            let mut entries = self.entries.write().await;
            if let Some(entry) =
                entries.get_mut(&(vendor_id.to_string(), vendor_product_id.to_string()))
            {
                entry.active = active;
            }
            Ok(())
        }
    }

    /// Quotes a flat rate after an optional delay.
    struct FlatRateAdapter {
        cost_cents: i64,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl VendorAdapter for FlatRateAdapter {
        async fn create_order(
            &self,
            _request: &VendorOrderRequest,
        ) -> Result<VendorOrderReceipt, VendorError> {
            Err(VendorError::Permanent("not under test".into()))
        }

        async fn get_order_status(
            &self,
            _vendor_order_id: &str,
        ) -> Result<VendorOrderStatus, VendorError> {
            Ok(VendorOrderStatus::Unknown)
        }

        async fn cancel_order(
            &self,
            _vendor_order_id: &str,
        ) -> Result<CancelOutcome, VendorError> {
            Ok(CancelOutcome::Cancelled)
        }

        async fn list_products(
            &self,
            _page_token: Option<&str>,
        ) -> Result<ProductPage, VendorError> {
            Ok(ProductPage {
                items: vec![],
                next_page_token: None,
            })
        }

        async fn quote_shipping(
            &self,
            _items: &[LineItem],
            _destination: &Address,
        ) -> Result<ShippingRate, VendorError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(ShippingRate {
                cost_cents: self.cost_cents,
                currency: "USD".into(),
                eta_days: 5,
            })
        }
    }

    fn profile(vendor_id: &str) -> VendorProfile {
        VendorProfile {
            vendor_id: vendor_id.to_string(),
            display_name: vendor_id.to_uppercase(),
            enabled: true,
            capabilities: vec![Capability::ShippingQuote],
            timeout_ms: 60_000,
            rate_limit_per_minute: None,
        }
    }

    fn item(vendor_product_id: &str) -> LineItem {
        LineItem {
            vendor_product_id: vendor_product_id.to_string(),
            quantity: 1,
            unit_price_cents: 1_000,
        }
    }

    fn destination() -> Address {
        Address {
            line1: "1 Main St".into(),
            line2: None,
            city: "Springfield".into(),
            region: None,
            postal_code: "12345".into(),
            country: "US".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_vendor_is_reported_failed_not_awaited_forever() {
        let registry = Arc::new(AdapterRegistry::new());
        registry.register(
            profile("fast"),
            Arc::new(FlatRateAdapter {
                cost_cents: 700,
                delay: None,
            }),
        );
        registry.register(
            profile("slow"),
            Arc::new(FlatRateAdapter {
                cost_cents: 100,
                delay: Some(Duration::from_secs(3_600)),
            }),
        );

        let catalog = Arc::new(TestCatalogStore::new());
        catalog.seed("fast", "sku-1").await;
        catalog.seed("slow", "sku-1").await;

        let aggregator = ShippingQuoteAggregator::new(
            registry,
            catalog,
            Duration::from_millis(500),
        );
        let outcome = aggregator
            .quote(&[item("sku-1")], &destination())
            .await
            .unwrap();

        assert_eq!(outcome.quotes.len(), 1);
        assert_eq!(outcome.quotes[0].vendor_id, "fast");
        assert_eq!(outcome.quotes[0].cost_cents, 700);
        assert_eq!(outcome.failed_vendors, vec!["slow".to_string()]);
    }

    #[tokio::test]
    async fn only_vendors_carrying_the_items_are_quoted() {
        let registry = Arc::new(AdapterRegistry::new());
        registry.register(
            profile("carries"),
            Arc::new(FlatRateAdapter {
                cost_cents: 400,
                delay: None,
            }),
        );
        registry.register(
            profile("unrelated"),
            Arc::new(FlatRateAdapter {
                cost_cents: 100,
                delay: None,
            }),
        );

        let catalog = Arc::new(TestCatalogStore::new());
        catalog.seed("carries", "sku-1").await;

        let aggregator = ShippingQuoteAggregator::new(
            registry,
            catalog,
            Duration::from_secs(1),
        );
        let outcome = aggregator
            .quote(&[item("sku-1")], &destination())
            .await
            .unwrap();

        assert_eq!(outcome.quotes.len(), 1);
        assert_eq!(outcome.quotes[0].vendor_id, "carries");
        assert!(outcome.failed_vendors.is_empty());
    }

    #[tokio::test]
    async fn empty_item_list_is_a_validation_error() {
        let registry = Arc::new(AdapterRegistry::new());
        let catalog = Arc::new(TestCatalogStore::new());
        let aggregator =
            ShippingQuoteAggregator::new(registry, catalog, Duration::from_secs(1));

        let err = aggregator.quote(&[], &destination()).await.unwrap_err();
        assert_eq!(err.kind(), dropflow_core::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn inactive_catalog_entries_do_not_route_quotes() {
        let registry = Arc::new(AdapterRegistry::new());
        registry.register(
            profile("v1"),
            Arc::new(FlatRateAdapter {
                cost_cents: 400,
                delay: None,
            }),
        );

        let catalog = Arc::new(TestCatalogStore::new());
        catalog.seed("v1", "sku-1").await;
        catalog.set_active("v1", "sku-1", false).await.unwrap();

        let aggregator =
            ShippingQuoteAggregator::new(registry, catalog, Duration::from_secs(1));
        let outcome = aggregator
            .quote(&[item("sku-1")], &destination())
            .await
            .unwrap();

        assert!(outcome.quotes.is_empty());
        assert!(outcome.failed_vendors.is_empty());
    }
}
