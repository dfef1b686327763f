//! Create donation use case.
//! Records a pledge against an active campaign; no payment is requested yet.

use bigdecimal::BigDecimal;
use std::time::Duration;

use crate::domain::{Donation, NewDonation};
use crate::error::AppError;
use crate::ports::{CampaignLedgerRef, DonationRepositoryRef};
use crate::services::settlement::{call_with_deadline, DEFAULT_RPC_TIMEOUT};
use crate::validation::{clean_message, validate_amount, validate_positive_id};

/// Input for the CreateDonation use case.
#[derive(Debug, Clone)]
pub struct DonationInput {
    pub user_id: i64,
    pub campaign_id: i64,
    pub amount: BigDecimal,
    pub message: String,
}

pub struct CreateDonation {
    donations: DonationRepositoryRef,
    campaigns: CampaignLedgerRef,
    rpc_timeout: Duration,
}

impl CreateDonation {
    pub fn new(donations: DonationRepositoryRef, campaigns: CampaignLedgerRef) -> Self {
        Self {
            donations,
            campaigns,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
        }
    }

    pub fn with_rpc_timeout(mut self, rpc_timeout: Duration) -> Self {
        self.rpc_timeout = rpc_timeout;
        self
    }

    #[tracing::instrument(
        skip(self, input),
        fields(user_id = input.user_id, campaign_id = input.campaign_id)
    )]
    pub async fn execute(&self, input: DonationInput) -> Result<Donation, AppError> {
        validate_positive_id("campaign_id", input.campaign_id)?;
        validate_amount(&input.amount)?;
        let message = clean_message(&input.message)?;

        let campaign = call_with_deadline(
            self.rpc_timeout,
            "campaign service",
            self.campaigns.get_campaign(input.campaign_id),
        )
        .await?;
        if !campaign.is_active() {
            return Err(AppError::FailedPrecondition(format!(
                "campaign {} is not active",
                campaign.id
            )));
        }

        let donation = self
            .donations
            .insert(&NewDonation {
                user_id: input.user_id,
                campaign_id: input.campaign_id,
                amount: input.amount,
                message,
            })
            .await?;

        tracing::info!(donation_id = donation.id, amount = %donation.amount, "Donation created");
        Ok(donation)
    }
}
