//! Transaction domain entity.
//! Tracks the attempt to collect a donation's amount through a provider invoice.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Donation, UnknownStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Paid,
    Settled,
    Canceled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Paid => "PAID",
            TransactionStatus::Settled => "SETTLED",
            TransactionStatus::Canceled => "CANCELED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// Money was collected; the donation and campaign must reflect it.
    pub fn is_paid(&self) -> bool {
        matches!(self, TransactionStatus::Paid | TransactionStatus::Settled)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "PAID" => Ok(TransactionStatus::Paid),
            "SETTLED" => Ok(TransactionStatus::Settled),
            "CANCELED" => Ok(TransactionStatus::Canceled),
            other => Err(UnknownStatus {
                kind: "transaction",
                value: other.to_string(),
            }),
        }
    }
}

/// Domain entity representing a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub donation_id: i64,
    pub invoice_id: String,
    pub invoice_url: String,
    pub invoice_description: String,
    pub payment_method: Option<String>,
    pub amount: BigDecimal,
    pub status: TransactionStatus,
    /// Set once the donation is completed and the campaign credited.
    pub credited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// A paid transaction whose downstream effects have not been confirmed yet.
    pub fn needs_credit(&self) -> bool {
        self.status.is_paid() && self.credited_at.is_none()
    }
}

/// Insert payload built from the donation and the provider's invoice.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub donation_id: i64,
    pub invoice_id: String,
    pub invoice_url: String,
    pub invoice_description: String,
    pub amount: BigDecimal,
    pub status: TransactionStatus,
}

/// Terminal transition applied to a `PENDING` transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementUpdate {
    pub status: TransactionStatus,
    pub payment_method: Option<String>,
    /// Refreshed invoice details; `None` keeps the stored value.
    pub invoice_url: Option<String>,
    pub invoice_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionWithDonation {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub donation: Donation,
}
