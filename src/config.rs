use anyhow::{bail, Context};
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::payment::client::DEFAULT_PROVIDER_URL;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub identity_service_url: String,
    pub campaign_service_url: String,
    pub payment_provider_url: String,
    pub payment_provider_api_key: String,
    pub rpc_timeout_secs: u64,
    pub provider_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so parsing is testable without
    /// touching the environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).with_context(|| format!("{} must be set", key));

        let config = Config {
            server_port: parse_or(&lookup, "SERVER_PORT", 3000)?,
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            identity_service_url: required("IDENTITY_SERVICE_URL")?,
            campaign_service_url: required("CAMPAIGN_SERVICE_URL")?,
            payment_provider_url: lookup("PAYMENT_PROVIDER_URL")
                .unwrap_or_else(|| DEFAULT_PROVIDER_URL.to_string()),
            payment_provider_api_key: required("PAYMENT_PROVIDER_API_KEY")?,
            rpc_timeout_secs: parse_or(&lookup, "RPC_TIMEOUT_SECS", 5)?,
            provider_timeout_secs: parse_or(&lookup, "PROVIDER_TIMEOUT_SECS", 10)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("IDENTITY_SERVICE_URL", &self.identity_service_url),
            ("CAMPAIGN_SERVICE_URL", &self.campaign_service_url),
            ("PAYMENT_PROVIDER_URL", &self.payment_provider_url),
        ] {
            url::Url::parse(value).with_context(|| format!("{} is not a valid URL", name))?;
        }
        if self.payment_provider_api_key.trim().is_empty() {
            bail!("PAYMENT_PROVIDER_API_KEY is empty");
        }
        if self.rpc_timeout_secs == 0 || self.provider_timeout_secs == 0 {
            bail!("RPC_TIMEOUT_SECS and PROVIDER_TIMEOUT_SECS must be greater than 0");
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}
