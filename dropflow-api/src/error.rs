use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dropflow_core::{ErrorKind, FulfillError};
use serde_json::json;

/// Boundary error for every handler. Anything convertible to `anyhow::Error`
/// funnels in via `?`; engine errors keep their kind for the status mapping,
/// everything else is a masked 500.
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self.0.downcast::<FulfillError>() {
            Ok(err) => {
                let kind = err.kind();
                let status = match kind {
                    ErrorKind::Validation => StatusCode::BAD_REQUEST,
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Conflict => StatusCode::CONFLICT,
                    ErrorKind::Configuration => StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorKind::VendorPermanent => StatusCode::BAD_GATEWAY,
                    ErrorKind::VendorTransient => StatusCode::SERVICE_UNAVAILABLE,
                    ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("Internal Server Error: {}", err);
                    (status, kind, "Internal Server Error".to_string())
                } else {
                    (status, kind, err.to_string())
                }
            }
            Err(other) => {
                tracing::error!("Internal Server Error: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorKind::Internal,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "kind": kind.as_str(),
        }));

        (status, body).into_response()
    }
}
