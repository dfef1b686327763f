//! Campaign ledger fragment owned by the campaign service.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CampaignStatus {
    Active,
    Other(String),
}

impl From<String> for CampaignStatus {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("active") {
            CampaignStatus::Active
        } else {
            CampaignStatus::Other(value)
        }
    }
}

impl From<CampaignStatus> for String {
    fn from(status: CampaignStatus) -> Self {
        match status {
            CampaignStatus::Active => "ACTIVE".to_string(),
            CampaignStatus::Other(value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub title: String,
    pub status: CampaignStatus,
    pub target_amount: BigDecimal,
    pub collected_amount: BigDecimal,
}

impl Campaign {
    pub fn is_active(&self) -> bool {
        self.status == CampaignStatus::Active
    }
}

/// An additive increment to a campaign's collected amount.
///
/// The campaign service applies each `idempotency_key` at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerCredit {
    pub amount: BigDecimal,
    pub idempotency_key: String,
}

impl LedgerCredit {
    pub fn for_donation(donation_id: i64, amount: BigDecimal) -> Self {
        Self {
            amount,
            idempotency_key: format!("donation-{}", donation_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditReceipt {
    pub collected_amount: BigDecimal,
    /// False when the key had already been credited by an earlier call.
    pub applied: bool,
}
