//! Settlement orchestrator: creates provider invoices for donations and
//! propagates confirmed payments into the donation and campaign stores.
//!
//! There is no shared transaction across the three stores. Each stage is
//! individually retryable and converges on the same end state:
//!
//! 1. the transaction row moves `PENDING -> PAID|CANCELED` through a guarded update,
//! 2. the donation is completed (idempotent),
//! 3. the campaign is credited under the key `donation-<id>` (at most once, enforced remotely),
//! 4. `credited_at` is stamped so later calls skip 2 and 3.
//!
//! A paid transaction without `credited_at` replays 2-4 on every reconciliation.

use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::domain::{
    Donation, DonationStatus, LedgerCredit, NewTransaction, SettlementUpdate, Transaction,
    TransactionStatus, TransactionWithDonation,
};
use crate::error::AppError;
use crate::payment::{CreateInvoiceRequest, Invoice, InvoiceStatus};
use crate::ports::{
    CampaignLedgerRef, DonationRepositoryRef, IdentityServiceRef, PaymentProviderRef,
    TransactionRepositoryRef,
};
use crate::validation::{truncate_chars, validate_amount, INVOICE_DESCRIPTION_MAX_LEN};

pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    StillPending,
    Paid,
    Canceled,
}

impl From<TransactionStatus> for ReconcileOutcome {
    fn from(status: TransactionStatus) -> Self {
        match status {
            TransactionStatus::Pending => ReconcileOutcome::StillPending,
            TransactionStatus::Paid | TransactionStatus::Settled => ReconcileOutcome::Paid,
            TransactionStatus::Canceled => ReconcileOutcome::Canceled,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub outcome: ReconcileOutcome,
    pub transaction: TransactionWithDonation,
}

/// Maps the provider's invoice state onto a terminal local transition.
///
/// `None` means "still pending", which includes statuses we do not recognise.
pub fn settlement_target(invoice: &Invoice) -> Option<SettlementUpdate> {
    let (status, payment_method) = match &invoice.status {
        InvoiceStatus::Paid | InvoiceStatus::Settled => {
            (TransactionStatus::Paid, invoice.payment_method.clone())
        }
        InvoiceStatus::Expired => (TransactionStatus::Canceled, None),
        InvoiceStatus::Pending | InvoiceStatus::Other(_) => return None,
    };

    Some(SettlementUpdate {
        status,
        payment_method,
        invoice_url: non_empty(&invoice.invoice_url),
        invoice_description: non_empty(&invoice.description)
            .map(|d| truncate_chars(&d, INVOICE_DESCRIPTION_MAX_LEN)),
    })
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Runs a remote call under a deadline; an elapsed deadline is a failure.
pub async fn call_with_deadline<T, E, F>(
    deadline: Duration,
    service: &str,
    call: F,
) -> Result<T, AppError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<AppError>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(AppError::Unavailable(format!(
            "{} did not answer within {}ms",
            service,
            deadline.as_millis()
        ))),
    }
}

pub struct SettlementService {
    donations: DonationRepositoryRef,
    transactions: TransactionRepositoryRef,
    identity: IdentityServiceRef,
    campaigns: CampaignLedgerRef,
    payments: PaymentProviderRef,
    rpc_timeout: Duration,
    provider_timeout: Duration,
}

impl SettlementService {
    pub fn new(
        donations: DonationRepositoryRef,
        transactions: TransactionRepositoryRef,
        identity: IdentityServiceRef,
        campaigns: CampaignLedgerRef,
        payments: PaymentProviderRef,
    ) -> Self {
        Self {
            donations,
            transactions,
            identity,
            campaigns,
            payments,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// Deadline for identity and campaign calls.
    pub fn with_rpc_timeout(mut self, rpc_timeout: Duration) -> Self {
        self.rpc_timeout = rpc_timeout;
        self
    }

    /// Deadline for payment provider calls.
    pub fn with_provider_timeout(mut self, provider_timeout: Duration) -> Self {
        self.provider_timeout = provider_timeout;
        self
    }

    /// Opens a provider invoice for a donation and records the transaction.
    ///
    /// Nothing is written before the invoice exists. If the final insert fails
    /// the invoice is left orphaned at the provider; that is logged, not retried.
    #[tracing::instrument(skip(self))]
    pub async fn create_transaction(
        &self,
        user_id: i64,
        donation_id: i64,
    ) -> Result<TransactionWithDonation, AppError> {
        let donation = self.donations.get_by_id(donation_id).await?;
        if !donation.is_owned_by(user_id) {
            return Err(AppError::Unauthorized(format!(
                "donation {} does not belong to user {}",
                donation_id, user_id
            )));
        }

        if let Some(existing) = self.transactions.find_by_donation_id(donation_id).await? {
            return Err(AppError::Conflict(format!(
                "transaction already exists for donation {} (transaction {})",
                donation_id, existing.id
            )));
        }

        validate_amount(&donation.amount)?;

        let campaign = call_with_deadline(
            self.rpc_timeout,
            "campaign service",
            self.campaigns.get_campaign(donation.campaign_id),
        )
        .await?;
        if !campaign.is_active() {
            return Err(AppError::FailedPrecondition(format!(
                "campaign {} is not active",
                campaign.id
            )));
        }

        let donor = call_with_deadline(
            self.rpc_timeout,
            "identity service",
            self.identity.get_user(donation.user_id),
        )
        .await?;

        let request = CreateInvoiceRequest {
            external_id: format!("donation-{}", donation.id),
            amount: donation.amount.clone(),
            payer_email: donor.email.clone(),
            description: truncate_chars(
                &format!("Donation for {} by {}", campaign.title, donor.name),
                INVOICE_DESCRIPTION_MAX_LEN,
            ),
        };
        let invoice = call_with_deadline(
            self.provider_timeout,
            "payment provider",
            self.payments.create_invoice(&request),
        )
        .await?;

        let new_tx = NewTransaction {
            donation_id: donation.id,
            invoice_id: invoice.id.clone(),
            invoice_url: invoice.invoice_url.clone(),
            invoice_description: truncate_chars(&invoice.description, INVOICE_DESCRIPTION_MAX_LEN),
            amount: donation.amount.clone(),
            status: initial_status(&invoice.status),
        };

        let transaction = match self.transactions.insert(&new_tx).await {
            Ok(transaction) => transaction,
            Err(e) => {
                warn!(
                    invoice_id = %invoice.id,
                    donation_id,
                    error = %e,
                    "Invoice created but transaction not persisted; invoice is orphaned"
                );
                return Err(e.into());
            }
        };

        info!(
            transaction_id = transaction.id,
            invoice_id = %transaction.invoice_id,
            status = %transaction.status,
            "Transaction created for donation {}",
            donation.id
        );

        Ok(TransactionWithDonation {
            transaction,
            donation,
        })
    }

    /// Reconciles a transaction against the provider and propagates payment.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile_transaction(
        &self,
        user_id: i64,
        transaction_id: i64,
    ) -> Result<ReconcileReport, AppError> {
        let transaction = self.transactions.get_by_id(transaction_id).await?;
        let donation = self.donations.get_by_id(transaction.donation_id).await?;
        if !donation.is_owned_by(user_id) {
            return Err(AppError::Unauthorized(format!(
                "transaction {} does not belong to user {}",
                transaction_id, user_id
            )));
        }

        self.reconcile(transaction, donation).await
    }

    /// Same as [`Self::reconcile_transaction`], addressed by donation id.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile_donation(
        &self,
        user_id: i64,
        donation_id: i64,
    ) -> Result<ReconcileReport, AppError> {
        let donation = self.donations.get_by_id(donation_id).await?;
        if !donation.is_owned_by(user_id) {
            return Err(AppError::Unauthorized(format!(
                "donation {} does not belong to user {}",
                donation_id, user_id
            )));
        }

        let transaction = self
            .transactions
            .find_by_donation_id(donation_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("no transaction for donation {}", donation_id))
            })?;

        self.reconcile(transaction, donation).await
    }

    async fn reconcile(
        &self,
        mut transaction: Transaction,
        mut donation: Donation,
    ) -> Result<ReconcileReport, AppError> {
        if transaction.status == TransactionStatus::Pending {
            let invoice = call_with_deadline(
                self.provider_timeout,
                "payment provider",
                self.payments.get_invoice(&transaction.invoice_id),
            )
            .await?;

            match settlement_target(&invoice) {
                None => {
                    debug!(
                        transaction_id = transaction.id,
                        invoice_status = %String::from(invoice.status),
                        "Invoice still pending"
                    );
                }
                Some(update) => {
                    transaction = match self
                        .transactions
                        .apply_settlement(transaction.id, &update)
                        .await?
                    {
                        Some(updated) => {
                            info!(
                                transaction_id = updated.id,
                                status = %updated.status,
                                payment_method = ?updated.payment_method,
                                "Transaction settled"
                            );
                            updated
                        }
                        // A concurrent reconciliation got there first.
                        None => self.transactions.get_by_id(transaction.id).await?,
                    };
                }
            }
        }

        if transaction.needs_credit() {
            let (credited, completed) = self.propagate_payment(transaction, donation).await?;
            transaction = credited;
            donation = completed;
        }

        Ok(ReconcileReport {
            outcome: ReconcileOutcome::from(transaction.status),
            transaction: TransactionWithDonation {
                transaction,
                donation,
            },
        })
    }

    /// Completes the donation and credits the campaign for a paid transaction.
    async fn propagate_payment(
        &self,
        transaction: Transaction,
        donation: Donation,
    ) -> Result<(Transaction, Donation), AppError> {
        let donation = if donation.status == DonationStatus::Completed {
            donation
        } else {
            self.donations
                .mark_completed(donation.id)
                .await
                .map_err(|e| {
                    warn!(
                        transaction_id = transaction.id,
                        donation_id = donation.id,
                        error = %e,
                        "Transaction paid but donation not completed; retry reconciliation"
                    );
                    AppError::from(e)
                })?
        };

        let credit = LedgerCredit::for_donation(donation.id, transaction.amount.clone());
        let receipt = call_with_deadline(
            self.rpc_timeout,
            "campaign service",
            self.campaigns.credit_collected(donation.campaign_id, &credit),
        )
        .await
        .map_err(|e| {
            warn!(
                transaction_id = transaction.id,
                campaign_id = donation.campaign_id,
                error = %e,
                "Transaction paid but campaign not credited; retry reconciliation"
            );
            e
        })?;

        if receipt.applied {
            info!(
                campaign_id = donation.campaign_id,
                amount = %credit.amount,
                collected_amount = %receipt.collected_amount,
                "Campaign credited"
            );
        } else {
            info!(
                campaign_id = donation.campaign_id,
                key = %credit.idempotency_key,
                "Campaign credit already applied"
            );
        }

        let transaction = self
            .transactions
            .mark_credited(transaction.id)
            .await
            .map_err(|e| {
                error!(
                    transaction_id = transaction.id,
                    error = %e,
                    "Campaign credited but credit marker not stored"
                );
                AppError::from(e)
            })?;
        Ok((transaction, donation))
    }
}

fn initial_status(status: &InvoiceStatus) -> TransactionStatus {
    match status {
        InvoiceStatus::Paid | InvoiceStatus::Settled => TransactionStatus::Paid,
        InvoiceStatus::Expired => TransactionStatus::Canceled,
        InvoiceStatus::Pending | InvoiceStatus::Other(_) => TransactionStatus::Pending,
    }
}
