use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dropflow_api::{app, worker, AppState};
use dropflow_catalog::{CatalogStore, CatalogSyncCoordinator};
use dropflow_core::{AdapterRegistry, VendorAdapter};
use dropflow_order::{OrchestratorConfig, OrderOrchestrator, OrderStore};
use dropflow_quote::ShippingQuoteAggregator;
use dropflow_store::postgres;
use dropflow_store::{Config, MemoryCatalogStore, MemoryOrderStore, PgCatalogStore, PgOrderStore};
use dropflow_vendors::{HttpVendorAdapter, StaticVendorAdapter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dropflow_api=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().expect("Failed to load config");
    tracing::info!("Starting Dropflow engine on port {}", config.server.port);

    let registry = Arc::new(AdapterRegistry::new());
    for vendor in &config.vendors {
        let adapter: Arc<dyn VendorAdapter> = match &vendor.base_url {
            Some(base_url) => Arc::new(
                HttpVendorAdapter::new(base_url, Duration::from_millis(vendor.timeout_ms))
                    .expect("Failed to build vendor HTTP client"),
            ),
            // Vendors without a base URL run on the deterministic in-memory
            // adapter, useful for local development.
            None => Arc::new(StaticVendorAdapter::new(&vendor.id)),
        };
        registry.register(vendor.profile(), adapter);
        tracing::info!(vendor_id = %vendor.id, enabled = vendor.enabled, "vendor registered");
    }

    let (order_store, catalog_store): (Arc<dyn OrderStore>, Arc<dyn CatalogStore>) =
        match &config.database.url {
            Some(url) => {
                let pool = postgres::connect(url)
                    .await
                    .expect("Failed to connect to database");
                postgres::init_schema(&pool)
                    .await
                    .expect("Failed to initialize database schema");
                (
                    Arc::new(PgOrderStore::new(pool.clone())),
                    Arc::new(PgCatalogStore::new(pool)),
                )
            }
            None => {
                tracing::warn!("no database configured, using in-memory stores");
                (
                    Arc::new(MemoryOrderStore::new()),
                    Arc::new(MemoryCatalogStore::new()),
                )
            }
        };

    let orchestrator = Arc::new(OrderOrchestrator::new(
        registry.clone(),
        order_store,
        OrchestratorConfig {
            max_retries: config.orchestrator.max_retries,
            submit_timeout: Duration::from_millis(config.orchestrator.submit_timeout_ms),
            backoff_base: Duration::from_millis(config.orchestrator.backoff_base_ms),
            backoff_cap: Duration::from_millis(config.orchestrator.backoff_cap_ms),
        },
    ));
    let catalog_sync = Arc::new(CatalogSyncCoordinator::new(
        registry.clone(),
        catalog_store.clone(),
    ));
    let quotes = Arc::new(ShippingQuoteAggregator::new(
        registry.clone(),
        catalog_store.clone(),
        Duration::from_millis(config.quotes.timeout_ms),
    ));

    worker::start_sync_worker(
        catalog_sync.clone(),
        Duration::from_secs(config.sync.interval_seconds),
    );
    worker::start_submission_watchdog(
        orchestrator.clone(),
        Duration::from_secs(config.orchestrator.watchdog_interval_seconds),
    );

    let state = AppState {
        registry,
        orchestrator,
        catalog_sync,
        quotes,
        catalog: catalog_store,
    };
    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server failed");
}
