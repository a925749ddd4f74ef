use axum::{http::Method, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod catalog;
pub mod error;
pub mod orders;
pub mod quotes;
pub mod state;
pub mod vendors;
pub mod worker;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    Router::new()
        .merge(orders::routes())
        .merge(catalog::routes())
        .merge(quotes::routes())
        .merge(vendors::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
