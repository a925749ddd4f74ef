use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use dropflow_core::{Address, Contact, LineItem};
use dropflow_order::models::OrderState;
use dropflow_order::{FulfillmentOrder, FulfillmentRequest};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/cancel", post(cancel_order))
        .route("/orders/{id}/retry", post(retry_order))
        .route("/orders/{id}/reconcile", post(reconcile_order))
        .route("/orders/{id}/status", post(apply_status_update))
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub vendor_id: String,
    pub items: Vec<LineItem>,
    pub destination: Address,
    pub buyer: Contact,
    #[serde(default)]
    pub notes: Option<String>,
    pub idempotency_key: String,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub idempotency_key: String,
    pub vendor_id: String,
    pub vendor_order_id: Option<String>,
    pub state: String,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_kind: Option<String>,
    pub retry_count: u32,
    pub retryable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FulfillmentOrder> for OrderResponse {
    fn from(order: FulfillmentOrder) -> Self {
        Self {
            id: order.id,
            idempotency_key: order.idempotency_key,
            vendor_id: order.vendor_id,
            vendor_order_id: order.vendor_order_id,
            state: order.state.as_str().to_string(),
            tracking_number: order.tracking_number,
            estimated_delivery: order.estimated_delivery,
            delivered_at: order.delivered_at,
            last_error: order.last_error,
            last_error_kind: order.last_error_kind.map(|k| k.as_str().to_string()),
            retry_count: order.retry_count,
            retryable: order.retryable,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

async fn create_order(
    State(state): State<AppState>,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    let request = FulfillmentRequest {
        items: body.items,
        destination: body.destination,
        buyer: body.buyer,
        notes: body.notes,
        idempotency_key: body.idempotency_key,
    };

    let order = state
        .orchestrator
        .create_order(request, &body.vendor_id)
        .await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

#[derive(Debug, Deserialize)]
struct ListOrdersParams {
    vendor_id: Option<String>,
}

async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let orders = state
        .orchestrator
        .list_orders(params.vendor_id.as_deref())
        .await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.orchestrator.get_order(id).await?;
    Ok(Json(order.into()))
}

async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.orchestrator.cancel_order(id).await?;
    Ok(Json(order.into()))
}

async fn retry_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.orchestrator.retry_order(id).await?;
    Ok(Json(order.into()))
}

async fn reconcile_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.orchestrator.reconcile_order(id).await?;
    Ok(Json(order.into()))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub state: OrderState,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

/// Externally pushed status update; same single mutation point the poller
/// uses.
async fn apply_status_update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusUpdateRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state
        .orchestrator
        .apply_status_update(id, body.state, body.tracking_number)
        .await?;
    Ok(Json(order.into()))
}
