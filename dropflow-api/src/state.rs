use std::sync::Arc;

use dropflow_catalog::{CatalogStore, CatalogSyncCoordinator};
use dropflow_core::AdapterRegistry;
use dropflow_order::OrderOrchestrator;
use dropflow_quote::ShippingQuoteAggregator;

/// Explicitly constructed application state, passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<AdapterRegistry>,
    pub orchestrator: Arc<OrderOrchestrator>,
    pub catalog_sync: Arc<CatalogSyncCoordinator>,
    pub quotes: Arc<ShippingQuoteAggregator>,
    pub catalog: Arc<dyn CatalogStore>,
}
