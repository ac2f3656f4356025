use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dishpatch_core::{OrderError, PromoError, StoreError};
use serde_json::json;

/// HTTP-facing error. Domain errors map to the client-visible status; only
/// store failures are masked behind a generic 500.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Forbidden(String),
    Order(OrderError),
    Promo(PromoError),
    Store(StoreError),
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Store(e) => ApiError::Store(e),
            other => ApiError::Order(other),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Order(err) => {
                let status = match &err {
                    OrderError::NotFound(_) => StatusCode::NOT_FOUND,
                    OrderError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    OrderError::Forbidden(_) => StatusCode::FORBIDDEN,
                    OrderError::Conflict(_) => StatusCode::CONFLICT,
                    OrderError::Validation(_) => StatusCode::BAD_REQUEST,
                    OrderError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
            ApiError::Promo(err) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
            ApiError::Store(err) => {
                tracing::error!("store failure: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
