use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use dropflow_api::{app, AppState};
use dropflow_catalog::CatalogSyncCoordinator;
use dropflow_core::{AdapterRegistry, Capability, VendorProduct, VendorProfile};
use dropflow_order::{OrchestratorConfig, OrderOrchestrator};
use dropflow_quote::ShippingQuoteAggregator;
use dropflow_store::{MemoryCatalogStore, MemoryOrderStore};
use dropflow_vendors::StaticVendorAdapter;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn profile(vendor_id: &str) -> VendorProfile {
    VendorProfile {
        vendor_id: vendor_id.to_string(),
        display_name: format!("Vendor {vendor_id}"),
        enabled: true,
        capabilities: vec![
            Capability::OrderCreation,
            Capability::CatalogSync,
            Capability::ShippingQuote,
        ],
        timeout_ms: 5_000,
        rate_limit_per_minute: None,
    }
}

fn product(id: &str, price_cents: i64) -> VendorProduct {
    VendorProduct {
        vendor_product_id: id.to_string(),
        name: format!("Product {id}"),
        price_cents,
        currency: "USD".to_string(),
        in_stock: true,
        stock_quantity: Some(25),
    }
}

struct TestApp {
    router: Router,
    registry: Arc<AdapterRegistry>,
}

fn build_app() -> TestApp {
    let registry = Arc::new(AdapterRegistry::new());
    let adapter = StaticVendorAdapter::new("v1")
        .with_products(vec![product("sku-1", 1000), product("sku-2", 2500)]);
    registry.register(profile("v1"), Arc::new(adapter));

    let order_store = Arc::new(MemoryOrderStore::new());
    let catalog_store = Arc::new(MemoryCatalogStore::new());

    let orchestrator = Arc::new(OrderOrchestrator::new(
        registry.clone(),
        order_store,
        OrchestratorConfig {
            max_retries: 3,
            submit_timeout: Duration::from_secs(10),
            backoff_base: Duration::from_millis(1),
            backoff_cap: Duration::from_millis(5),
        },
    ));
    let catalog_sync = Arc::new(CatalogSyncCoordinator::new(
        registry.clone(),
        catalog_store.clone(),
    ));
    let quotes = Arc::new(ShippingQuoteAggregator::new(
        registry.clone(),
        catalog_store.clone(),
        Duration::from_millis(500),
    ));

    let state = AppState {
        registry: registry.clone(),
        orchestrator,
        catalog_sync,
        quotes,
        catalog: catalog_store,
    };

    TestApp {
        router: app(state),
        registry,
    }
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn order_body(key: &str) -> Value {
    json!({
        "vendor_id": "v1",
        "idempotency_key": key,
        "items": [
            {"vendor_product_id": "sku-1", "quantity": 2, "unit_price_cents": 1000}
        ],
        "destination": {
            "line1": "1 Main St",
            "city": "Springfield",
            "postal_code": "12345",
            "country": "US"
        },
        "buyer": {"name": "Jane Doe", "email": "jane@example.com"}
    })
}

#[tokio::test]
async fn create_order_submits_and_returns_accepted() {
    let test = build_app();

    let response = test
        .router
        .oneshot(post_json("/orders", order_body("abc")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    assert_eq!(body["state"], "ACCEPTED");
    assert_eq!(body["vendor_order_id"], "v1-1");
    assert_eq!(body["retry_count"], 0);
    assert_eq!(body["idempotency_key"], "abc");
}

#[tokio::test]
async fn resubmission_with_same_key_returns_existing_order() {
    let test = build_app();

    let first = test
        .router
        .clone()
        .oneshot(post_json("/orders", order_body("abc")))
        .await
        .unwrap();
    let first = read_json(first).await;

    let second = test
        .router
        .oneshot(post_json("/orders", order_body("abc")))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CREATED);
    let second = read_json(second).await;

    assert_eq!(first["id"], second["id"]);
    assert_eq!(second["vendor_order_id"], "v1-1");
}

#[tokio::test]
async fn same_key_different_payload_is_a_conflict() {
    let test = build_app();

    let response = test
        .router
        .clone()
        .oneshot(post_json("/orders", order_body("abc")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let mut altered = order_body("abc");
    altered["items"][0]["quantity"] = json!(5);
    let response = test
        .router
        .oneshot(post_json("/orders", altered))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = read_json(response).await;
    assert_eq!(body["kind"], "CONFLICT");
}

#[tokio::test]
async fn empty_items_are_rejected() {
    let test = build_app();

    let mut body = order_body("abc");
    body["items"] = json!([]);
    let response = test.router.oneshot(post_json("/orders", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = read_json(response).await;
    assert_eq!(body["kind"], "VALIDATION");
}

#[tokio::test]
async fn unknown_order_is_a_404() {
    let test = build_app();

    let response = test
        .router
        .oneshot(get("/orders/00000000-0000-0000-0000-000000000000"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_after_shipment_is_rejected_and_state_kept() {
    let test = build_app();

    let created = test
        .router
        .clone()
        .oneshot(post_json("/orders", order_body("abc")))
        .await
        .unwrap();
    let created = read_json(created).await;
    let id = created["id"].as_str().unwrap().to_string();

    // Ship the order through the status-update surface.
    let response = test
        .router
        .clone()
        .oneshot(post_json(
            &format!("/orders/{id}/status"),
            json!({"state": "SHIPPED", "tracking_number": "TRK-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = test
        .router
        .clone()
        .oneshot(post_json(&format!("/orders/{id}/cancel"), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let fetched = test
        .router
        .oneshot(get(&format!("/orders/{id}")))
        .await
        .unwrap();
    let fetched = read_json(fetched).await;
    assert_eq!(fetched["state"], "SHIPPED");
    assert_eq!(fetched["tracking_number"], "TRK-1");
}

#[tokio::test]
async fn backward_status_update_is_rejected() {
    let test = build_app();

    let created = test
        .router
        .clone()
        .oneshot(post_json("/orders", order_body("abc")))
        .await
        .unwrap();
    let created = read_json(created).await;
    let id = created["id"].as_str().unwrap().to_string();

    let response = test
        .router
        .clone()
        .oneshot(post_json(
            &format!("/orders/{id}/status"),
            json!({"state": "DELIVERED"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = test
        .router
        .oneshot(post_json(
            &format!("/orders/{id}/status"),
            json!({"state": "SHIPPED"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn catalog_sync_reports_counts_and_entries_are_listable() {
    let test = build_app();

    let response = test
        .router
        .clone()
        .oneshot(post_json("/catalog/sync/v1", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let outcome = read_json(response).await;
    assert_eq!(outcome["vendor_id"], "v1");
    assert_eq!(outcome["inserted"], 2);
    assert_eq!(outcome["updated"], 0);
    assert_eq!(outcome["deactivated"], 0);
    assert_eq!(outcome["partial"], false);

    let response = test.router.oneshot(get("/catalog/v1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let entries = read_json(response).await;
    assert_eq!(entries.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn quotes_fan_out_to_capable_vendors() {
    let test = build_app();

    // The aggregator only quotes vendors whose catalog carries the items.
    test.router
        .clone()
        .oneshot(post_json("/catalog/sync/v1", json!({})))
        .await
        .unwrap();

    let response = test
        .router
        .oneshot(post_json(
            "/quotes",
            json!({
                "items": [
                    {"vendor_product_id": "sku-1", "quantity": 2, "unit_price_cents": 1000}
                ],
                "destination": {
                    "line1": "1 Main St",
                    "city": "Springfield",
                    "postal_code": "12345",
                    "country": "US"
                }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let outcome = read_json(response).await;
    let quotes = outcome["quotes"].as_array().unwrap();
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0]["vendor_id"], "v1");
    assert!(outcome["failed_vendors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn disabled_vendor_rejects_new_orders() {
    let test = build_app();

    let response = test
        .router
        .clone()
        .oneshot(post_json("/vendors/v1/disable", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let profile = read_json(response).await;
    assert_eq!(profile["enabled"], false);

    let response = test
        .router
        .clone()
        .oneshot(post_json("/orders", order_body("abc")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json(response).await;
    assert_eq!(body["kind"], "CONFIGURATION");

    // Re-enabling restores submissions.
    test.router
        .clone()
        .oneshot(post_json("/vendors/v1/enable", json!({})))
        .await
        .unwrap();
    let response = test
        .router
        .oneshot(post_json("/orders", order_body("abc")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn vendor_listing_includes_registered_profiles() {
    let test = build_app();
    assert!(test.registry.profile("v1").is_some());

    let response = test.router.oneshot(get("/vendors")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let profiles = read_json(response).await;
    let profiles = profiles.as_array().unwrap();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0]["vendor_id"], "v1");
}
