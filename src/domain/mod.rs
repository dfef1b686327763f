//! Framework-agnostic entities for the donation service.

pub mod campaign;
pub mod donation;
pub mod transaction;
pub mod user;

pub use campaign::{Campaign, CampaignStatus, CreditReceipt, LedgerCredit};
pub use donation::{Donation, DonationStatus, NewDonation};
pub use transaction::{
    NewTransaction, SettlementUpdate, Transaction, TransactionStatus, TransactionWithDonation,
};
pub use user::User;

/// Raised when a persisted status column holds a value outside the known vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} status: {value}")]
pub struct UnknownStatus {
    pub kind: &'static str,
    pub value: String,
}
