use crate::config::Config;
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::time::Duration;

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub identity: bool,
    pub campaign: bool,
    pub payment_provider: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database && self.identity && self.campaign && self.payment_provider
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Database Connectivity: {}", status(self.database));
        println!("Identity Service:      {}", status(self.identity));
        println!("Campaign Service:      {}", status(self.campaign));
        println!("Payment Provider:      {}", status(self.payment_provider));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  - {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "PASS" } else { "FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "OK" } else { "FAIL" }
}

pub async fn validate_environment(config: &Config, pool: &PgPool) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        identity: true,
        campaign: true,
        payment_provider: true,
        errors: Vec::new(),
    };

    if let Err(e) = config.validate() {
        report.environment = false;
        report.errors.push(format!("Environment: {:#}", e));
    }

    if let Err(e) = validate_database(pool).await {
        report.database = false;
        report.errors.push(format!("Database: {:#}", e));
    }

    let (identity, campaign, provider) = tokio::join!(
        validate_reachable(&config.identity_service_url),
        validate_reachable(&config.campaign_service_url),
        validate_reachable(&config.payment_provider_url),
    );

    if let Err(e) = identity {
        report.identity = false;
        report.errors.push(format!("Identity service: {:#}", e));
    }
    if let Err(e) = campaign {
        report.campaign = false;
        report.errors.push(format!("Campaign service: {:#}", e));
    }
    if let Err(e) = provider {
        report.payment_provider = false;
        report.errors.push(format!("Payment provider: {:#}", e));
    }

    Ok(report)
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

async fn validate_reachable(url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;

    if response.status().is_server_error() {
        anyhow::bail!("{} returned status: {}", url, response.status());
    }

    Ok(())
}
