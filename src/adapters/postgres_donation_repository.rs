//! Postgres implementation of DonationRepository.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Donation, DonationStatus, NewDonation};
use crate::ports::{DonationRepository, RepositoryError, RepositoryResult};

#[derive(Clone)]
pub struct PostgresDonationRepository {
    pool: PgPool,
}

impl PostgresDonationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DonationRepository for PostgresDonationRepository {
    async fn insert(&self, donation: &NewDonation) -> RepositoryResult<Donation> {
        let row = sqlx::query_as::<_, DonationRow>(
            r#"
            INSERT INTO donations (user_id, campaign_id, amount, message, status)
            VALUES ($1, $2, $3, $4, 'PENDING')
            RETURNING id, user_id, campaign_id, amount, message, status, created_at, updated_at
            "#,
        )
        .bind(donation.user_id)
        .bind(donation.campaign_id)
        .bind(&donation.amount)
        .bind(&donation.message)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.into_domain()
    }

    async fn get_by_id(&self, id: i64) -> RepositoryResult<Donation> {
        let row = sqlx::query_as::<_, DonationRow>(
            r#"
            SELECT id, user_id, campaign_id, amount, message, status, created_at, updated_at
            FROM donations WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(|r| r.into_domain())
            .unwrap_or_else(|| Err(RepositoryError::NotFound(format!("donation {}", id))))
    }

    async fn mark_completed(&self, id: i64) -> RepositoryResult<Donation> {
        // updated_at only moves on the actual PENDING -> COMPLETED transition.
        let row = sqlx::query_as::<_, DonationRow>(
            r#"
            UPDATE donations
            SET status = 'COMPLETED',
                updated_at = CASE WHEN status = 'COMPLETED' THEN updated_at ELSE NOW() END
            WHERE id = $1
            RETURNING id, user_id, campaign_id, amount, message, status, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(|r| r.into_domain())
            .unwrap_or_else(|| Err(RepositoryError::NotFound(format!("donation {}", id))))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DonationRow {
    id: i64,
    user_id: i64,
    campaign_id: i64,
    amount: BigDecimal,
    message: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DonationRow {
    fn into_domain(self) -> RepositoryResult<Donation> {
        let status = self
            .status
            .parse::<DonationStatus>()
            .map_err(|e| RepositoryError::InvalidData(e.to_string()))?;

        Ok(Donation {
            id: self.id,
            user_id: self.user_id,
            campaign_id: self.campaign_id,
            amount: self.amount,
            message: self.message,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
