#![allow(dead_code)]

use bigdecimal::BigDecimal;
use std::sync::Arc;

use donation_core::adapters::in_memory::{
    InMemoryCampaignLedger, InMemoryDonationRepository, InMemoryIdentityService,
    InMemoryPaymentProvider, InMemoryTransactionRepository,
};
use donation_core::domain::{Campaign, CampaignStatus, Donation, NewDonation, User};
use donation_core::ports::DonationRepository;
use donation_core::services::SettlementService;
use donation_core::use_cases::CreateDonation;

pub const DONOR_ID: i64 = 11;
pub const OTHER_USER_ID: i64 = 12;
pub const CAMPAIGN_ID: i64 = 5;

/// Every collaborator in memory, with one donor and one active campaign.
pub struct Harness {
    pub donations: InMemoryDonationRepository,
    pub transactions: InMemoryTransactionRepository,
    pub identity: InMemoryIdentityService,
    pub campaigns: InMemoryCampaignLedger,
    pub payments: InMemoryPaymentProvider,
}

impl Harness {
    pub async fn new() -> Self {
        let harness = Self {
            donations: InMemoryDonationRepository::new(),
            transactions: InMemoryTransactionRepository::new(),
            identity: InMemoryIdentityService::new(),
            campaigns: InMemoryCampaignLedger::new(),
            payments: InMemoryPaymentProvider::new(),
        };
        harness
            .identity
            .add_user(User {
                id: DONOR_ID,
                name: "Ayu".to_string(),
                email: "ayu@example.com".to_string(),
            })
            .await;
        harness
            .campaigns
            .add_campaign(campaign(CAMPAIGN_ID, CampaignStatus::Active))
            .await;
        harness
    }

    pub fn settlement(&self) -> SettlementService {
        SettlementService::new(
            Arc::new(self.donations.clone()),
            Arc::new(self.transactions.clone()),
            Arc::new(self.identity.clone()),
            Arc::new(self.campaigns.clone()),
            Arc::new(self.payments.clone()),
        )
    }

    pub fn create_donation(&self) -> CreateDonation {
        CreateDonation::new(
            Arc::new(self.donations.clone()),
            Arc::new(self.campaigns.clone()),
        )
    }

    pub async fn donation(&self, amount: i64) -> Donation {
        self.donation_for(DONOR_ID, CAMPAIGN_ID, amount).await
    }

    pub async fn donation_for(&self, user_id: i64, campaign_id: i64, amount: i64) -> Donation {
        self.donations
            .insert(&NewDonation {
                user_id,
                campaign_id,
                amount: BigDecimal::from(amount),
                message: String::new(),
            })
            .await
            .unwrap()
    }

    pub async fn collected(&self) -> BigDecimal {
        self.campaigns.collected_amount(CAMPAIGN_ID).await.unwrap()
    }
}

pub fn campaign(id: i64, status: CampaignStatus) -> Campaign {
    Campaign {
        id,
        user_id: 1,
        title: "Clean water for Sumba".to_string(),
        status,
        target_amount: BigDecimal::from(10_000_000),
        collected_amount: BigDecimal::from(0),
    }
}
