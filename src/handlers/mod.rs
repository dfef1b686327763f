pub mod donations;
pub mod transactions;

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::error::AppError;
use crate::health::check_health;
use crate::AppState;

/// Set by the gateway after it has verified the caller's token.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller, as forwarded by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequesterId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for RequesterId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::BadRequest("missing X-User-Id header".to_string()))?;

        raw.trim()
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .map(RequesterId)
            .ok_or_else(|| AppError::BadRequest("X-User-Id must be a positive integer".to_string()))
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = check_health(&state.dependencies, state.start_time).await;

    // Return 503 if a critical dependency is down, 200 otherwise
    let status_code = if report.is_unhealthy() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(report))
}
