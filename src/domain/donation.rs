//! Donation entity.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::UnknownStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DonationStatus {
    Pending,
    Completed,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationStatus::Pending => "PENDING",
            DonationStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DonationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(DonationStatus::Pending),
            "COMPLETED" => Ok(DonationStatus::Completed),
            other => Err(UnknownStatus {
                kind: "donation",
                value: other.to_string(),
            }),
        }
    }
}

/// A pledge by a user toward a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donation {
    pub id: i64,
    pub user_id: i64,
    pub campaign_id: i64,
    pub amount: BigDecimal,
    pub message: String,
    pub status: DonationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Donation {
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}

/// Insert payload; the store assigns id, status and timestamps.
#[derive(Debug, Clone)]
pub struct NewDonation {
    pub user_id: i64,
    pub campaign_id: i64,
    pub amount: BigDecimal,
    pub message: String,
}
