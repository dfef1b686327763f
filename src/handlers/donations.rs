use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use bigdecimal::BigDecimal;
use serde::Deserialize;

use super::RequesterId;
use crate::error::AppError;
use crate::use_cases::DonationInput;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDonationPayload {
    pub campaign_id: i64,
    pub amount: BigDecimal,
    #[serde(default)]
    pub message: String,
}

pub async fn create_donation(
    State(state): State<AppState>,
    RequesterId(user_id): RequesterId,
    Json(payload): Json<CreateDonationPayload>,
) -> Result<impl IntoResponse, AppError> {
    let donation = state
        .donations
        .execute(DonationInput {
            user_id,
            campaign_id: payload.campaign_id,
            amount: payload.amount,
            message: payload.message,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(donation)))
}
