//! Collaborator seams for the settlement pipeline.
//! The orchestrator depends only on these traits; adapters and clients implement them.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{
    Campaign, CreditReceipt, Donation, LedgerCredit, NewDonation, NewTransaction,
    SettlementUpdate, Transaction, User,
};
use crate::payment::{CreateInvoiceRequest, Invoice, PaymentError};

/// Postgres SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid stored data: {0}")]
    InvalidData(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            return RepositoryError::NotFound("row not found".to_string());
        }
        if let Some(db) = err.as_database_error() {
            if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return RepositoryError::Conflict(db.message().to_string());
            }
        }
        RepositoryError::Database(err)
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Failure of a remote call to the identity or campaign service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("remote error ({status}): {message}")]
    Remote { status: u16, message: String },
    #[error("circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

impl ClientError {
    /// Whether the failure says something about the remote's health.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Unavailable(_) => true,
            ClientError::Remote { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Unavailable(err.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[async_trait]
pub trait DonationRepository: Send + Sync {
    async fn insert(&self, donation: &NewDonation) -> RepositoryResult<Donation>;
    async fn get_by_id(&self, id: i64) -> RepositoryResult<Donation>;
    /// Sets status to `COMPLETED`. Completing an already-completed donation is a no-op.
    async fn mark_completed(&self, id: i64) -> RepositoryResult<Donation>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Fails with `Conflict` when the donation already has a transaction.
    async fn insert(&self, tx: &NewTransaction) -> RepositoryResult<Transaction>;
    async fn get_by_id(&self, id: i64) -> RepositoryResult<Transaction>;
    async fn find_by_donation_id(&self, donation_id: i64) -> RepositoryResult<Option<Transaction>>;
    /// Applies the update only while the row is still `PENDING`.
    /// Returns `None` when another writer already moved it to a terminal state.
    async fn apply_settlement(
        &self,
        id: i64,
        update: &SettlementUpdate,
    ) -> RepositoryResult<Option<Transaction>>;
    /// Records that the donation and campaign reflect this payment. Idempotent.
    async fn mark_credited(&self, id: i64) -> RepositoryResult<Transaction>;
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn get_user(&self, id: i64) -> ClientResult<User>;
}

#[async_trait]
pub trait CampaignLedger: Send + Sync {
    async fn get_campaign(&self, id: i64) -> ClientResult<Campaign>;
    /// Atomic add at the campaign service, at most once per `credit.idempotency_key`.
    async fn credit_collected(&self, id: i64, credit: &LedgerCredit) -> ClientResult<CreditReceipt>;
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_invoice(&self, request: &CreateInvoiceRequest) -> Result<Invoice, PaymentError>;
    async fn get_invoice(&self, invoice_id: &str) -> Result<Invoice, PaymentError>;
}

pub type DonationRepositoryRef = Arc<dyn DonationRepository>;
pub type TransactionRepositoryRef = Arc<dyn TransactionRepository>;
pub type IdentityServiceRef = Arc<dyn IdentityService>;
pub type CampaignLedgerRef = Arc<dyn CampaignLedger>;
pub type PaymentProviderRef = Arc<dyn PaymentProvider>;
