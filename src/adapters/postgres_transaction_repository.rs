//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{NewTransaction, SettlementUpdate, Transaction, TransactionStatus};
use crate::ports::{RepositoryError, RepositoryResult, TransactionRepository};

const COLUMNS: &str = "id, donation_id, invoice_id, invoice_url, invoice_description, \
    payment_method, amount, status, credited_at, created_at, updated_at";

/// Postgres-backed transaction repository.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn insert(&self, tx: &NewTransaction) -> RepositoryResult<Transaction> {
        // The unique index on donation_id turns a racing second insert into a Conflict.
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO transactions (
                donation_id, invoice_id, invoice_url, invoice_description, amount, status
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(tx.donation_id)
        .bind(&tx.invoice_id)
        .bind(&tx.invoice_url)
        .bind(&tx.invoice_description)
        .bind(&tx.amount)
        .bind(tx.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match RepositoryError::from(e) {
            RepositoryError::Conflict(_) => RepositoryError::Conflict(format!(
                "transaction already exists for donation {}",
                tx.donation_id
            )),
            other => other,
        })?;

        row.into_domain()
    }

    async fn get_by_id(&self, id: i64) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(|r| r.into_domain())
            .unwrap_or_else(|| Err(RepositoryError::NotFound(format!("transaction {}", id))))
    }

    async fn find_by_donation_id(&self, donation_id: i64) -> RepositoryResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE donation_id = $1",
            COLUMNS
        ))
        .bind(donation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(|r| r.into_domain()).transpose()
    }

    async fn apply_settlement(
        &self,
        id: i64,
        update: &SettlementUpdate,
    ) -> RepositoryResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
            SET status = $2,
                payment_method = COALESCE($3, payment_method),
                invoice_url = COALESCE($4, invoice_url),
                invoice_description = COALESCE($5, invoice_description),
                updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(id)
        .bind(update.status.as_str())
        .bind(&update.payment_method)
        .bind(&update.invoice_url)
        .bind(&update.invoice_description)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(|r| r.into_domain()).transpose()
    }

    async fn mark_credited(&self, id: i64) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
            SET credited_at = COALESCE(credited_at, NOW()), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(|r| r.into_domain())
            .unwrap_or_else(|| Err(RepositoryError::NotFound(format!("transaction {}", id))))
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    donation_id: i64,
    invoice_id: String,
    invoice_url: String,
    invoice_description: String,
    payment_method: Option<String>,
    amount: BigDecimal,
    status: String,
    credited_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        let status = self
            .status
            .parse::<TransactionStatus>()
            .map_err(|e| RepositoryError::InvalidData(e.to_string()))?;

        Ok(Transaction {
            id: self.id,
            donation_id: self.donation_id,
            invoice_id: self.invoice_id,
            invoice_url: self.invoice_url,
            invoice_description: self.invoice_description,
            payment_method: self.payment_method,
            amount: self.amount,
            status,
            credited_at: self.credited_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
