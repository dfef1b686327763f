use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use super::RequesterId;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTransactionPayload {
    pub donation_id: i64,
}

pub async fn create_transaction(
    State(state): State<AppState>,
    RequesterId(user_id): RequesterId,
    Json(payload): Json<CreateTransactionPayload>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = state
        .settlement
        .create_transaction(user_id, payload.donation_id)
        .await?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn sync_transaction(
    State(state): State<AppState>,
    RequesterId(user_id): RequesterId,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let report = state.settlement.reconcile_transaction(user_id, id).await?;
    Ok(Json(report))
}

pub async fn sync_donation(
    State(state): State<AppState>,
    RequesterId(user_id): RequesterId,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let report = state.settlement.reconcile_donation(user_id, id).await?;
    Ok(Json(report))
}
