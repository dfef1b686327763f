mod common;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{campaign, Harness, CAMPAIGN_ID, DONOR_ID, OTHER_USER_ID};
use donation_core::adapters::in_memory::{
    InMemoryDonationRepository, InMemoryPaymentProvider, InMemoryTransactionRepository,
};
use donation_core::domain::{
    CampaignStatus, Donation, DonationStatus, NewDonation, NewTransaction, SettlementUpdate,
    Transaction, TransactionStatus,
};
use donation_core::error::AppError;
use donation_core::payment::{CreateInvoiceRequest, Invoice, InvoiceStatus, PaymentError};
use donation_core::ports::{
    DonationRepository, PaymentProvider, RepositoryError, RepositoryResult,
    TransactionRepository,
};
use donation_core::services::{ReconcileOutcome, SettlementService};
use donation_core::use_cases::DonationInput;

#[tokio::test]
async fn test_create_transaction_opens_pending_invoice() {
    let h = Harness::new().await;
    let donation = h.donation(50_000).await;

    let created = h
        .settlement()
        .create_transaction(DONOR_ID, donation.id)
        .await
        .unwrap();

    assert_eq!(created.transaction.invoice_id, "inv-1");
    assert_eq!(created.transaction.status, TransactionStatus::Pending);
    assert_eq!(created.transaction.amount, BigDecimal::from(50_000));
    assert_eq!(
        created.transaction.invoice_description,
        "Donation for Clean water for Sumba by Ayu"
    );
    assert_eq!(created.donation.id, donation.id);
    assert_eq!(h.payments.invoice_count().await, 1);
}

#[tokio::test]
async fn test_reconcile_pending_invoice_changes_nothing() {
    let h = Harness::new().await;
    let settlement = h.settlement();
    let donation = h.donation(50_000).await;
    let created = settlement.create_transaction(DONOR_ID, donation.id).await.unwrap();

    let report = settlement
        .reconcile_transaction(DONOR_ID, created.transaction.id)
        .await
        .unwrap();

    assert_eq!(report.outcome, ReconcileOutcome::StillPending);
    assert_eq!(report.transaction.transaction.status, TransactionStatus::Pending);
    assert_eq!(report.transaction.donation.status, DonationStatus::Pending);
    assert_eq!(h.collected().await, BigDecimal::from(0));
}

#[tokio::test]
async fn test_paid_invoice_completes_donation_and_credits_campaign_once() {
    let h = Harness::new().await;
    let settlement = h.settlement();
    let donation = h.donation(50_000).await;
    let created = settlement.create_transaction(DONOR_ID, donation.id).await.unwrap();
    h.payments
        .set_status("inv-1", InvoiceStatus::Paid, Some("EWALLET"))
        .await;

    let report = settlement
        .reconcile_transaction(DONOR_ID, created.transaction.id)
        .await
        .unwrap();

    assert_eq!(report.outcome, ReconcileOutcome::Paid);
    assert_eq!(report.transaction.transaction.status, TransactionStatus::Paid);
    assert_eq!(
        report.transaction.transaction.payment_method.as_deref(),
        Some("EWALLET")
    );
    assert!(report.transaction.transaction.credited_at.is_some());
    assert_eq!(report.transaction.donation.status, DonationStatus::Completed);
    assert_eq!(h.collected().await, BigDecimal::from(50_000));

    let again = settlement
        .reconcile_transaction(DONOR_ID, created.transaction.id)
        .await
        .unwrap();

    assert_eq!(again.outcome, ReconcileOutcome::Paid);
    assert_eq!(h.collected().await, BigDecimal::from(50_000));
}

#[tokio::test]
async fn test_settled_invoice_counts_as_paid() {
    let h = Harness::new().await;
    let settlement = h.settlement();
    let donation = h.donation(1_000).await;
    let created = settlement.create_transaction(DONOR_ID, donation.id).await.unwrap();
    h.payments
        .set_status("inv-1", InvoiceStatus::Settled, Some("BANK_TRANSFER"))
        .await;

    let report = settlement
        .reconcile_transaction(DONOR_ID, created.transaction.id)
        .await
        .unwrap();

    assert_eq!(report.outcome, ReconcileOutcome::Paid);
    assert_eq!(report.transaction.transaction.status, TransactionStatus::Paid);
    assert_eq!(h.collected().await, BigDecimal::from(1_000));
}

#[tokio::test]
async fn test_expired_invoice_cancels_without_credit() {
    let h = Harness::new().await;
    let settlement = h.settlement();
    let donation = h.donation(50_000).await;
    let created = settlement.create_transaction(DONOR_ID, donation.id).await.unwrap();
    h.payments.set_status("inv-1", InvoiceStatus::Expired, None).await;

    let report = settlement
        .reconcile_transaction(DONOR_ID, created.transaction.id)
        .await
        .unwrap();

    assert_eq!(report.outcome, ReconcileOutcome::Canceled);
    assert_eq!(report.transaction.transaction.status, TransactionStatus::Canceled);
    assert_eq!(report.transaction.donation.status, DonationStatus::Pending);
    assert_eq!(h.collected().await, BigDecimal::from(0));
}

#[tokio::test]
async fn test_unrecognised_invoice_status_is_still_pending() {
    let h = Harness::new().await;
    let settlement = h.settlement();
    let donation = h.donation(50_000).await;
    let created = settlement.create_transaction(DONOR_ID, donation.id).await.unwrap();
    h.payments
        .set_status("inv-1", InvoiceStatus::Other("REFUND_REQUESTED".to_string()), None)
        .await;

    let report = settlement
        .reconcile_transaction(DONOR_ID, created.transaction.id)
        .await
        .unwrap();

    assert_eq!(report.outcome, ReconcileOutcome::StillPending);
}

#[tokio::test]
async fn test_canceled_transaction_stays_canceled() {
    let h = Harness::new().await;
    let settlement = h.settlement();
    let donation = h.donation(50_000).await;
    let created = settlement.create_transaction(DONOR_ID, donation.id).await.unwrap();
    h.payments.set_status("inv-1", InvoiceStatus::Expired, None).await;
    settlement
        .reconcile_transaction(DONOR_ID, created.transaction.id)
        .await
        .unwrap();

    // A late payment notice must not resurrect a canceled transaction.
    h.payments
        .set_status("inv-1", InvoiceStatus::Paid, Some("EWALLET"))
        .await;
    let report = settlement
        .reconcile_transaction(DONOR_ID, created.transaction.id)
        .await
        .unwrap();

    assert_eq!(report.outcome, ReconcileOutcome::Canceled);
    assert_eq!(h.collected().await, BigDecimal::from(0));
}

#[tokio::test]
async fn test_inactive_campaign_is_rejected_before_any_side_effect() {
    let h = Harness::new().await;
    h.campaigns
        .add_campaign(campaign(9, CampaignStatus::Other("CLOSED".to_string())))
        .await;
    let donation = h.donation_for(DONOR_ID, 9, 50_000).await;

    let err = h
        .settlement()
        .create_transaction(DONOR_ID, donation.id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::FailedPrecondition(_)));
    assert_eq!(h.payments.invoice_count().await, 0);
    assert_eq!(h.transactions.count().await, 0);
}

#[tokio::test]
async fn test_unknown_campaign_is_not_found() {
    let h = Harness::new().await;
    let donation = h.donation_for(DONOR_ID, 404, 50_000).await;

    let err = h
        .settlement()
        .create_transaction(DONOR_ID, donation.id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(h.payments.invoice_count().await, 0);
}

#[tokio::test]
async fn test_unknown_donation_is_not_found() {
    let h = Harness::new().await;

    let err = h.settlement().create_transaction(DONOR_ID, 999).await.unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_other_users_donation_is_unauthorized() {
    let h = Harness::new().await;
    let settlement = h.settlement();
    let donation = h.donation(50_000).await;

    let err = settlement
        .create_transaction(OTHER_USER_ID, donation.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
    assert_eq!(h.payments.invoice_count().await, 0);

    let created = settlement.create_transaction(DONOR_ID, donation.id).await.unwrap();
    let err = settlement
        .reconcile_transaction(OTHER_USER_ID, created.transaction.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    let err = settlement
        .reconcile_donation(OTHER_USER_ID, donation.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn test_second_transaction_for_donation_conflicts() {
    let h = Harness::new().await;
    let settlement = h.settlement();
    let donation = h.donation(50_000).await;
    settlement.create_transaction(DONOR_ID, donation.id).await.unwrap();

    let err = settlement
        .create_transaction(DONOR_ID, donation.id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(h.payments.invoice_count().await, 1);
    assert_eq!(h.transactions.count().await, 1);
}

#[tokio::test]
async fn test_canceled_transaction_still_blocks_a_new_one() {
    let h = Harness::new().await;
    let settlement = h.settlement();
    let donation = h.donation(50_000).await;
    let created = settlement.create_transaction(DONOR_ID, donation.id).await.unwrap();
    h.payments.set_status("inv-1", InvoiceStatus::Expired, None).await;
    settlement
        .reconcile_transaction(DONOR_ID, created.transaction.id)
        .await
        .unwrap();

    let err = settlement
        .create_transaction(DONOR_ID, donation.id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(h.payments.invoice_count().await, 1);
}

#[tokio::test]
async fn test_provider_outage_on_create_persists_nothing() {
    let h = Harness::new().await;
    let donation = h.donation(50_000).await;
    h.payments.set_unavailable(true);

    let err = h
        .settlement()
        .create_transaction(DONOR_ID, donation.id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Unavailable(_)));
    assert_eq!(h.transactions.count().await, 0);
}

#[tokio::test]
async fn test_provider_outage_on_reconcile_leaves_transaction_pending() {
    let h = Harness::new().await;
    let settlement = h.settlement();
    let donation = h.donation(50_000).await;
    let created = settlement.create_transaction(DONOR_ID, donation.id).await.unwrap();
    h.payments.set_unavailable(true);

    let err = settlement
        .reconcile_transaction(DONOR_ID, created.transaction.id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Unavailable(_)));
    let stored = h.transactions.get_by_id(created.transaction.id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn test_ledger_outage_is_repaired_by_next_reconcile() {
    let h = Harness::new().await;
    let settlement = h.settlement();
    let donation = h.donation(50_000).await;
    let created = settlement.create_transaction(DONOR_ID, donation.id).await.unwrap();
    h.payments
        .set_status("inv-1", InvoiceStatus::Paid, Some("EWALLET"))
        .await;
    h.campaigns.set_unavailable(true);

    let err = settlement
        .reconcile_transaction(DONOR_ID, created.transaction.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unavailable(_)));

    let stored = h.transactions.get_by_id(created.transaction.id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Paid);
    assert!(stored.credited_at.is_none());
    assert_eq!(h.collected().await, BigDecimal::from(0));

    h.campaigns.set_unavailable(false);
    let report = settlement
        .reconcile_transaction(DONOR_ID, created.transaction.id)
        .await
        .unwrap();

    assert_eq!(report.outcome, ReconcileOutcome::Paid);
    assert!(report.transaction.transaction.credited_at.is_some());
    assert_eq!(report.transaction.donation.status, DonationStatus::Completed);
    assert_eq!(h.collected().await, BigDecimal::from(50_000));

    settlement
        .reconcile_transaction(DONOR_ID, created.transaction.id)
        .await
        .unwrap();
    assert_eq!(h.collected().await, BigDecimal::from(50_000));
}

#[tokio::test]
async fn test_reconcile_by_donation_id() {
    let h = Harness::new().await;
    let settlement = h.settlement();
    let donation = h.donation(20_000).await;

    let err = settlement
        .reconcile_donation(DONOR_ID, donation.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    settlement.create_transaction(DONOR_ID, donation.id).await.unwrap();
    h.payments
        .set_status("inv-1", InvoiceStatus::Paid, Some("QR_CODE"))
        .await;

    let report = settlement
        .reconcile_donation(DONOR_ID, donation.id)
        .await
        .unwrap();

    assert_eq!(report.outcome, ReconcileOutcome::Paid);
    let stored = h.donations.get_by_id(donation.id).await.unwrap();
    assert_eq!(stored.status, DonationStatus::Completed);
    assert_eq!(h.collected().await, BigDecimal::from(20_000));
}

struct SlowProvider;

#[async_trait]
impl PaymentProvider for SlowProvider {
    async fn create_invoice(
        &self,
        _request: &CreateInvoiceRequest,
    ) -> Result<Invoice, PaymentError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Err(PaymentError::Unavailable("should have timed out".to_string()))
    }

    async fn get_invoice(&self, _invoice_id: &str) -> Result<Invoice, PaymentError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Err(PaymentError::Unavailable("should have timed out".to_string()))
    }
}

#[tokio::test]
async fn test_slow_provider_times_out_as_unavailable() {
    let h = Harness::new().await;
    let donation = h.donation(50_000).await;
    let settlement = SettlementService::new(
        Arc::new(h.donations.clone()),
        Arc::new(h.transactions.clone()),
        Arc::new(h.identity.clone()),
        Arc::new(h.campaigns.clone()),
        Arc::new(SlowProvider),
    )
    .with_provider_timeout(Duration::from_millis(50));

    let err = settlement
        .create_transaction(DONOR_ID, donation.id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Unavailable(_)));
    assert_eq!(h.transactions.count().await, 0);
}

/// Answers after a fixed delay, slower than the RPC deadline but within the provider one.
struct LaggingProvider {
    inner: InMemoryPaymentProvider,
    delay: Duration,
}

#[async_trait]
impl PaymentProvider for LaggingProvider {
    async fn create_invoice(
        &self,
        request: &CreateInvoiceRequest,
    ) -> Result<Invoice, PaymentError> {
        tokio::time::sleep(self.delay).await;
        self.inner.create_invoice(request).await
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<Invoice, PaymentError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_invoice(invoice_id).await
    }
}

#[tokio::test]
async fn test_provider_deadline_is_independent_of_rpc_deadline() {
    let h = Harness::new().await;
    let donation = h.donation(50_000).await;
    let settlement = SettlementService::new(
        Arc::new(h.donations.clone()),
        Arc::new(h.transactions.clone()),
        Arc::new(h.identity.clone()),
        Arc::new(h.campaigns.clone()),
        Arc::new(LaggingProvider {
            inner: h.payments.clone(),
            delay: Duration::from_millis(200),
        }),
    )
    .with_rpc_timeout(Duration::from_millis(50))
    .with_provider_timeout(Duration::from_secs(2));

    let created = settlement
        .create_transaction(DONOR_ID, donation.id)
        .await
        .unwrap();
    assert_eq!(created.transaction.status, TransactionStatus::Pending);

    h.payments
        .set_status("inv-1", InvoiceStatus::Paid, Some("EWALLET"))
        .await;
    let report = settlement
        .reconcile_transaction(DONOR_ID, created.transaction.id)
        .await
        .unwrap();

    assert_eq!(report.outcome, ReconcileOutcome::Paid);
    assert_eq!(h.collected().await, BigDecimal::from(50_000));
}

#[tokio::test]
async fn test_unknown_donor_is_not_found_before_invoicing() {
    let h = Harness::new().await;
    let stranger = 99;
    let donation = h.donation_for(stranger, CAMPAIGN_ID, 50_000).await;

    let err = h
        .settlement()
        .create_transaction(stranger, donation.id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(h.payments.invoice_count().await, 0);
    assert_eq!(h.transactions.count().await, 0);
}

/// Delegates everything except `insert`, which always fails like a dropped pool.
struct FailingInsert {
    inner: InMemoryTransactionRepository,
}

#[async_trait]
impl TransactionRepository for FailingInsert {
    async fn insert(&self, _tx: &NewTransaction) -> RepositoryResult<Transaction> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn get_by_id(&self, id: i64) -> RepositoryResult<Transaction> {
        self.inner.get_by_id(id).await
    }

    async fn find_by_donation_id(&self, donation_id: i64) -> RepositoryResult<Option<Transaction>> {
        self.inner.find_by_donation_id(donation_id).await
    }

    async fn apply_settlement(
        &self,
        id: i64,
        update: &SettlementUpdate,
    ) -> RepositoryResult<Option<Transaction>> {
        self.inner.apply_settlement(id, update).await
    }

    async fn mark_credited(&self, id: i64) -> RepositoryResult<Transaction> {
        self.inner.mark_credited(id).await
    }
}

#[tokio::test]
async fn test_store_failure_after_invoice_surfaces_database_error() {
    let h = Harness::new().await;
    let donation = h.donation(50_000).await;
    let settlement = SettlementService::new(
        Arc::new(h.donations.clone()),
        Arc::new(FailingInsert {
            inner: h.transactions.clone(),
        }),
        Arc::new(h.identity.clone()),
        Arc::new(h.campaigns.clone()),
        Arc::new(h.payments.clone()),
    );

    let err = settlement
        .create_transaction(DONOR_ID, donation.id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Database(_)));
    // The invoice exists at the provider but nothing references it locally.
    assert_eq!(h.payments.invoice_count().await, 1);
    assert_eq!(h.transactions.count().await, 0);
    let stored = h.donations.get_by_id(donation.id).await.unwrap();
    assert_eq!(stored.status, DonationStatus::Pending);
}

/// Fails `mark_completed` while `failing` is set.
struct FlakyCompletion {
    inner: InMemoryDonationRepository,
    failing: Arc<AtomicBool>,
}

#[async_trait]
impl DonationRepository for FlakyCompletion {
    async fn insert(&self, donation: &NewDonation) -> RepositoryResult<Donation> {
        self.inner.insert(donation).await
    }

    async fn get_by_id(&self, id: i64) -> RepositoryResult<Donation> {
        self.inner.get_by_id(id).await
    }

    async fn mark_completed(&self, id: i64) -> RepositoryResult<Donation> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.mark_completed(id).await
    }
}

#[tokio::test]
async fn test_completion_failure_is_repaired_by_next_reconcile() {
    let h = Harness::new().await;
    let failing = Arc::new(AtomicBool::new(true));
    let settlement = SettlementService::new(
        Arc::new(FlakyCompletion {
            inner: h.donations.clone(),
            failing: failing.clone(),
        }),
        Arc::new(h.transactions.clone()),
        Arc::new(h.identity.clone()),
        Arc::new(h.campaigns.clone()),
        Arc::new(h.payments.clone()),
    );
    let donation = h.donation(50_000).await;
    let created = settlement.create_transaction(DONOR_ID, donation.id).await.unwrap();
    h.payments
        .set_status("inv-1", InvoiceStatus::Paid, Some("EWALLET"))
        .await;

    let err = settlement
        .reconcile_transaction(DONOR_ID, created.transaction.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Database(_)));

    let stored = h.transactions.get_by_id(created.transaction.id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Paid);
    assert!(stored.credited_at.is_none());
    let pledge = h.donations.get_by_id(donation.id).await.unwrap();
    assert_eq!(pledge.status, DonationStatus::Pending);
    assert_eq!(h.collected().await, BigDecimal::from(0));

    failing.store(false, Ordering::SeqCst);
    let report = settlement
        .reconcile_transaction(DONOR_ID, created.transaction.id)
        .await
        .unwrap();

    assert_eq!(report.outcome, ReconcileOutcome::Paid);
    assert_eq!(report.transaction.donation.status, DonationStatus::Completed);
    assert!(report.transaction.transaction.credited_at.is_some());
    assert_eq!(h.collected().await, BigDecimal::from(50_000));

    settlement
        .reconcile_transaction(DONOR_ID, created.transaction.id)
        .await
        .unwrap();
    assert_eq!(h.collected().await, BigDecimal::from(50_000));
}

#[tokio::test]
async fn test_settlement_refreshes_invoice_details() {
    let h = Harness::new().await;
    let settlement = h.settlement();
    let donation = h.donation(50_000).await;
    let created = settlement.create_transaction(DONOR_ID, donation.id).await.unwrap();
    h.payments
        .set_invoice_details(
            "inv-1",
            "https://checkout.example.com/inv-1/receipt",
            "Donation for Clean water for Sumba by Ayu (paid)",
        )
        .await;
    h.payments
        .set_status("inv-1", InvoiceStatus::Paid, Some("EWALLET"))
        .await;

    let report = settlement
        .reconcile_transaction(DONOR_ID, created.transaction.id)
        .await
        .unwrap();

    let tx = &report.transaction.transaction;
    assert_eq!(tx.invoice_url, "https://checkout.example.com/inv-1/receipt");
    assert_eq!(
        tx.invoice_description,
        "Donation for Clean water for Sumba by Ayu (paid)"
    );
    let stored = h.transactions.get_by_id(created.transaction.id).await.unwrap();
    assert_eq!(stored.invoice_url, tx.invoice_url);
}

#[tokio::test]
async fn test_create_donation_records_pending_pledge() {
    let h = Harness::new().await;

    let donation = h
        .create_donation()
        .execute(DonationInput {
            user_id: DONOR_ID,
            campaign_id: CAMPAIGN_ID,
            amount: BigDecimal::from(75_000),
            message: "  semoga   lancar  ".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(donation.status, DonationStatus::Pending);
    assert_eq!(donation.message, "semoga lancar");
    assert_eq!(donation.user_id, DONOR_ID);
}

#[tokio::test]
async fn test_create_donation_rejects_bad_input() {
    let h = Harness::new().await;
    let use_case = h.create_donation();
    let input = |amount: i64, message: String, campaign_id: i64| DonationInput {
        user_id: DONOR_ID,
        campaign_id,
        amount: BigDecimal::from(amount),
        message,
    };

    let zero = use_case.execute(input(0, String::new(), CAMPAIGN_ID)).await;
    assert!(matches!(zero, Err(AppError::FailedPrecondition(_))));

    let sub_cent = use_case
        .execute(DonationInput {
            amount: BigDecimal::from_str("10.005").unwrap(),
            ..input(0, String::new(), CAMPAIGN_ID)
        })
        .await;
    assert!(matches!(sub_cent, Err(AppError::FailedPrecondition(_))));

    let long = use_case
        .execute(input(10, "a".repeat(501), CAMPAIGN_ID))
        .await;
    assert!(matches!(long, Err(AppError::FailedPrecondition(_))));

    h.campaigns
        .add_campaign(campaign(9, CampaignStatus::Other("CLOSED".to_string())))
        .await;
    let closed = use_case.execute(input(10, String::new(), 9)).await;
    assert!(matches!(closed, Err(AppError::FailedPrecondition(_))));

    let missing = use_case.execute(input(10, String::new(), 404)).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}
