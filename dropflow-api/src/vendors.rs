use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use dropflow_core::VendorProfile;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/vendors", get(list_vendors))
        .route("/vendors/{vendor_id}/enable", post(enable_vendor))
        .route("/vendors/{vendor_id}/disable", post(disable_vendor))
}

async fn list_vendors(State(state): State<AppState>) -> Json<Vec<VendorProfile>> {
    Json(state.registry.list_profiles())
}

async fn enable_vendor(
    State(state): State<AppState>,
    Path(vendor_id): Path<String>,
) -> Result<Json<VendorProfile>, AppError> {
    state.registry.set_enabled(&vendor_id, true)?;
    profile_response(&state, &vendor_id)
}

async fn disable_vendor(
    State(state): State<AppState>,
    Path(vendor_id): Path<String>,
) -> Result<Json<VendorProfile>, AppError> {
    state.registry.set_enabled(&vendor_id, false)?;
    profile_response(&state, &vendor_id)
}

fn profile_response(state: &AppState, vendor_id: &str) -> Result<Json<VendorProfile>, AppError> {
    state
        .registry
        .profile(vendor_id)
        .map(Json)
        .ok_or_else(|| {
            dropflow_core::FulfillError::NotFound(format!("vendor not registered: {vendor_id}"))
                .into()
        })
}
