use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use dropflow_catalog::{CatalogEntry, SyncOutcome};
use dropflow_core::FulfillError;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/catalog/sync", post(sync_all))
        .route("/catalog/sync/{vendor_id}", post(sync_vendor))
        .route("/catalog/{vendor_id}", get(list_catalog))
}

async fn sync_vendor(
    State(state): State<AppState>,
    Path(vendor_id): Path<String>,
) -> Result<Json<SyncOutcome>, AppError> {
    let outcome = state.catalog_sync.sync_vendor(&vendor_id).await?;
    Ok(Json(outcome))
}

async fn sync_all(State(state): State<AppState>) -> Json<Vec<SyncOutcome>> {
    Json(state.catalog_sync.sync_all().await)
}

#[derive(Debug, Deserialize)]
struct ListCatalogParams {
    #[serde(default)]
    include_inactive: bool,
}

async fn list_catalog(
    State(state): State<AppState>,
    Path(vendor_id): Path<String>,
    Query(params): Query<ListCatalogParams>,
) -> Result<Json<Vec<CatalogEntry>>, AppError> {
    let entries = state
        .catalog
        .list_for_vendor(&vendor_id, params.include_inactive)
        .await
        .map_err(FulfillError::storage)?;
    Ok(Json(entries))
}
