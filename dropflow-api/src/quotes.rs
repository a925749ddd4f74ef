use axum::{extract::State, routing::post, Json, Router};
use dropflow_core::{Address, LineItem};
use dropflow_quote::QuoteOutcome;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/quotes", post(quote_shipping))
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub items: Vec<LineItem>,
    pub destination: Address,
}

async fn quote_shipping(
    State(state): State<AppState>,
    Json(body): Json<QuoteRequest>,
) -> Result<Json<QuoteOutcome>, AppError> {
    let outcome = state.quotes.quote(&body.items, &body.destination).await?;
    Ok(Json(outcome))
}
