//! In-memory implementations of every port.
//!
//! They hold the same guarantees the real collaborators promise: the
//! transaction store rejects a second transaction per donation atomically, and
//! the campaign ledger applies each credit key at most once under its lock.
//! Used by the test suites and for running the service without its neighbours.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{
    Campaign, CreditReceipt, Donation, DonationStatus, LedgerCredit, NewDonation,
    NewTransaction, SettlementUpdate, Transaction, User,
};
use crate::payment::{CreateInvoiceRequest, Invoice, InvoiceStatus, PaymentError};
use crate::ports::{
    CampaignLedger, ClientError, ClientResult, DonationRepository, IdentityService,
    PaymentProvider, RepositoryError, RepositoryResult, TransactionRepository,
};

#[derive(Default, Clone)]
pub struct InMemoryDonationRepository {
    donations: Arc<RwLock<HashMap<i64, Donation>>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryDonationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DonationRepository for InMemoryDonationRepository {
    async fn insert(&self, donation: &NewDonation) -> RepositoryResult<Donation> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        let now = Utc::now();
        let stored = Donation {
            id,
            user_id: donation.user_id,
            campaign_id: donation.campaign_id,
            amount: donation.amount.clone(),
            message: donation.message.clone(),
            status: DonationStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.donations.write().await.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_by_id(&self, id: i64) -> RepositoryResult<Donation> {
        self.donations
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("donation {}", id)))
    }

    async fn mark_completed(&self, id: i64) -> RepositoryResult<Donation> {
        let mut donations = self.donations.write().await;
        let donation = donations
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("donation {}", id)))?;
        if donation.status != DonationStatus::Completed {
            donation.status = DonationStatus::Completed;
            donation.updated_at = Utc::now();
        }
        Ok(donation.clone())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryTransactionRepository {
    transactions: Arc<RwLock<HashMap<i64, Transaction>>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.transactions.read().await.len()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn insert(&self, tx: &NewTransaction) -> RepositoryResult<Transaction> {
        let mut transactions = self.transactions.write().await;
        if transactions.values().any(|t| t.donation_id == tx.donation_id) {
            return Err(RepositoryError::Conflict(format!(
                "transaction already exists for donation {}",
                tx.donation_id
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        let now = Utc::now();
        let stored = Transaction {
            id,
            donation_id: tx.donation_id,
            invoice_id: tx.invoice_id.clone(),
            invoice_url: tx.invoice_url.clone(),
            invoice_description: tx.invoice_description.clone(),
            payment_method: None,
            amount: tx.amount.clone(),
            status: tx.status,
            credited_at: None,
            created_at: now,
            updated_at: now,
        };
        transactions.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_by_id(&self, id: i64) -> RepositoryResult<Transaction> {
        self.transactions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))
    }

    async fn find_by_donation_id(&self, donation_id: i64) -> RepositoryResult<Option<Transaction>> {
        Ok(self
            .transactions
            .read()
            .await
            .values()
            .find(|t| t.donation_id == donation_id)
            .cloned())
    }

    async fn apply_settlement(
        &self,
        id: i64,
        update: &SettlementUpdate,
    ) -> RepositoryResult<Option<Transaction>> {
        let mut transactions = self.transactions.write().await;
        let tx = transactions
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?;
        if tx.status.is_terminal() {
            return Ok(None);
        }
        tx.status = update.status;
        if let Some(method) = &update.payment_method {
            tx.payment_method = Some(method.clone());
        }
        if let Some(url) = &update.invoice_url {
            tx.invoice_url = url.clone();
        }
        if let Some(description) = &update.invoice_description {
            tx.invoice_description = description.clone();
        }
        tx.updated_at = Utc::now();
        Ok(Some(tx.clone()))
    }

    async fn mark_credited(&self, id: i64) -> RepositoryResult<Transaction> {
        let mut transactions = self.transactions.write().await;
        let tx = transactions
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?;
        let now = Utc::now();
        tx.credited_at.get_or_insert(now);
        tx.updated_at = now;
        Ok(tx.clone())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryIdentityService {
    users: Arc<RwLock<HashMap<i64, User>>>,
}

impl InMemoryIdentityService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }
}

#[async_trait]
impl IdentityService for InMemoryIdentityService {
    async fn get_user(&self, id: i64) -> ClientResult<User> {
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("user {}", id)))
    }
}

#[derive(Default)]
struct LedgerState {
    campaigns: HashMap<i64, Campaign>,
    credited_keys: HashSet<String>,
}

/// Campaign ledger with per-key credit markers.
#[derive(Default, Clone)]
pub struct InMemoryCampaignLedger {
    state: Arc<RwLock<LedgerState>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryCampaignLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_campaign(&self, campaign: Campaign) {
        self.state.write().await.campaigns.insert(campaign.id, campaign);
    }

    pub async fn collected_amount(&self, id: i64) -> Option<BigDecimal> {
        self.state
            .read()
            .await
            .campaigns
            .get(&id)
            .map(|c| c.collected_amount.clone())
    }

    /// While set, credit calls fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl CampaignLedger for InMemoryCampaignLedger {
    async fn get_campaign(&self, id: i64) -> ClientResult<Campaign> {
        self.state
            .read()
            .await
            .campaigns
            .get(&id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("campaign {}", id)))
    }

    async fn credit_collected(
        &self,
        id: i64,
        credit: &LedgerCredit,
    ) -> ClientResult<CreditReceipt> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::Unavailable("campaign service unreachable".to_string()));
        }

        let mut state = self.state.write().await;
        let LedgerState {
            campaigns,
            credited_keys,
        } = &mut *state;
        let campaign = campaigns
            .get_mut(&id)
            .ok_or_else(|| ClientError::NotFound(format!("campaign {}", id)))?;

        let applied = credited_keys.insert(credit.idempotency_key.clone());
        if applied {
            campaign.collected_amount = &campaign.collected_amount + &credit.amount;
        }

        Ok(CreditReceipt {
            collected_amount: campaign.collected_amount.clone(),
            applied,
        })
    }
}

/// Scriptable invoice provider. Invoices are numbered `inv-1`, `inv-2`, ...
#[derive(Default, Clone)]
pub struct InMemoryPaymentProvider {
    invoices: Arc<RwLock<HashMap<String, Invoice>>>,
    next_id: Arc<AtomicU64>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn invoice_count(&self) -> usize {
        self.invoices.read().await.len()
    }

    /// Simulates the payer acting on the invoice.
    pub async fn set_status(
        &self,
        invoice_id: &str,
        status: InvoiceStatus,
        payment_method: Option<&str>,
    ) {
        if let Some(invoice) = self.invoices.write().await.get_mut(invoice_id) {
            invoice.status = status;
            invoice.payment_method = payment_method.map(str::to_string);
        }
    }

    /// Simulates the provider reissuing the checkout page.
    pub async fn set_invoice_details(
        &self,
        invoice_id: &str,
        invoice_url: &str,
        description: &str,
    ) {
        if let Some(invoice) = self.invoices.write().await.get_mut(invoice_id) {
            invoice.invoice_url = invoice_url.to_string();
            invoice.description = description.to_string();
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), PaymentError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PaymentError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentProvider for InMemoryPaymentProvider {
    async fn create_invoice(
        &self,
        request: &CreateInvoiceRequest,
    ) -> Result<Invoice, PaymentError> {
        self.check_available()?;
        let id = format!("inv-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let invoice = Invoice {
            id: id.clone(),
            external_id: Some(request.external_id.clone()),
            status: InvoiceStatus::Pending,
            invoice_url: format!("https://checkout.example.com/{}", id),
            description: request.description.clone(),
            payment_method: None,
        };
        self.invoices.write().await.insert(id, invoice.clone());
        Ok(invoice)
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<Invoice, PaymentError> {
        self.check_available()?;
        self.invoices
            .read()
            .await
            .get(invoice_id)
            .cloned()
            .ok_or_else(|| PaymentError::InvoiceNotFound(invoice_id.to_string()))
    }
}
