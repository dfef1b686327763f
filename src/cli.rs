use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::services::SettlementService;

#[derive(Parser)]
#[command(name = "donation-core")]
#[command(about = "Donation Core - donation payments and campaign settlement", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Transaction management commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Reconcile a transaction against the payment provider
    Sync {
        /// Transaction ID
        #[arg(value_name = "TX_ID")]
        tx_id: i64,

        /// Owner of the donation behind the transaction
        #[arg(long = "user", value_name = "USER_ID")]
        user_id: i64,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

pub async fn handle_tx_sync(
    settlement: &SettlementService,
    user_id: i64,
    tx_id: i64,
) -> anyhow::Result<()> {
    let report = settlement
        .reconcile_transaction(user_id, tx_id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to sync transaction {}: {}", tx_id, e))?;

    let transaction = &report.transaction.transaction;
    tracing::info!(tx_id, outcome = ?report.outcome, "Transaction synced");
    println!("✓ Transaction {} synced", tx_id);
    println!("  Status: {}", transaction.status);
    println!(
        "  Donation: {} ({})",
        report.transaction.donation.id, report.transaction.donation.status
    );
    if let Some(method) = &transaction.payment_method {
        println!("  Payment method: {}", method);
    }
    println!("  Credited: {}", transaction.credited_at.is_some());

    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");

    Ok(())
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Identity Service URL: {}", config.identity_service_url);
    println!("  Campaign Service URL: {}", config.campaign_service_url);
    println!("  Payment Provider URL: {}", config.payment_provider_url);
    println!("  RPC Timeout: {}s", config.rpc_timeout_secs);
    println!("  Provider Timeout: {}s", config.provider_timeout_secs);

    let pool = crate::db::create_pool(config).await?;
    let report = crate::startup::validate_environment(config, &pool).await?;
    report.print();

    if !report.is_valid() {
        anyhow::bail!("Configuration validation failed");
    }

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
