pub mod adapters;
pub mod cli;
pub mod clients;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod payment;
pub mod ports;
pub mod services;
pub mod startup;
pub mod use_cases;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;

use crate::adapters::{PostgresDonationRepository, PostgresTransactionRepository};
use crate::clients::{CampaignClient, IdentityClient};
use crate::config::Config;
use crate::health::{Dependency, HttpChecker, PostgresChecker};
use crate::payment::InvoiceClient;
use crate::ports::{CampaignLedgerRef, DonationRepositoryRef};
use crate::services::SettlementService;
use crate::use_cases::CreateDonation;

#[derive(Clone)]
pub struct AppState {
    pub settlement: Arc<SettlementService>,
    pub donations: Arc<CreateDonation>,
    pub dependencies: Arc<Vec<Dependency>>,
    pub start_time: Instant,
}

impl AppState {
    /// Wires the Postgres repositories and the remote clients described by `config`.
    pub fn from_config(config: &Config, pool: PgPool) -> Self {
        let donations: DonationRepositoryRef =
            Arc::new(PostgresDonationRepository::new(pool.clone()));
        let transactions = Arc::new(PostgresTransactionRepository::new(pool.clone()));
        let identity = Arc::new(IdentityClient::new(
            config.identity_service_url.clone(),
            config.rpc_timeout(),
        ));
        let campaigns: CampaignLedgerRef = Arc::new(CampaignClient::new(
            config.campaign_service_url.clone(),
            config.rpc_timeout(),
        ));
        let payments = Arc::new(InvoiceClient::new(
            config.payment_provider_url.clone(),
            config.payment_provider_api_key.clone(),
            config.provider_timeout(),
        ));

        let settlement = SettlementService::new(
            donations.clone(),
            transactions,
            identity,
            campaigns.clone(),
            payments,
        )
        .with_rpc_timeout(config.rpc_timeout())
        .with_provider_timeout(config.provider_timeout());
        let create_donation =
            CreateDonation::new(donations, campaigns).with_rpc_timeout(config.rpc_timeout());

        let dependencies = vec![
            Dependency {
                name: "postgres".to_string(),
                critical: true,
                checker: Arc::new(PostgresChecker::new(pool)),
            },
            Dependency {
                name: "identity".to_string(),
                critical: false,
                checker: Arc::new(HttpChecker::new(config.identity_service_url.clone())),
            },
            Dependency {
                name: "campaign".to_string(),
                critical: false,
                checker: Arc::new(HttpChecker::new(config.campaign_service_url.clone())),
            },
        ];

        Self {
            settlement: Arc::new(settlement),
            donations: Arc::new(create_donation),
            dependencies: Arc::new(dependencies),
            start_time: Instant::now(),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/donations", post(handlers::donations::create_donation))
        .route("/donations/:id/sync", post(handlers::transactions::sync_donation))
        .route("/transactions", post(handlers::transactions::create_transaction))
        .route(
            "/transactions/:id/sync",
            post(handlers::transactions::sync_transaction),
        )
        .with_state(state)
}
