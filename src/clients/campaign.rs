use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use reqwest::Client;
use std::time::Duration;

use super::{circuit_breaker, circuit_state, http_client, read_json, reject, Breaker};
use crate::domain::{Campaign, CreditReceipt, LedgerCredit};
use crate::ports::{CampaignLedger, ClientError, ClientResult};

/// RPC client for the campaign service's ledger.
///
/// Credits are posted with an idempotency key so the campaign service can
/// apply the increment under its own concurrency control, at most once per key.
#[derive(Clone)]
pub struct CampaignClient {
    client: Client,
    base_url: String,
    circuit_breaker: Breaker,
}

impl CampaignClient {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self::with_circuit_breaker(
            base_url,
            timeout,
            super::DEFAULT_FAILURE_THRESHOLD,
            super::DEFAULT_RESET_TIMEOUT_SECS,
        )
    }

    pub fn with_circuit_breaker(
        base_url: String,
        timeout: Duration,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        CampaignClient {
            client: http_client(timeout),
            base_url,
            circuit_breaker: circuit_breaker(failure_threshold, reset_timeout_secs),
        }
    }

    pub fn circuit_state(&self) -> String {
        circuit_state(&self.circuit_breaker)
    }

    fn campaign_url(&self, id: i64) -> String {
        format!("{}/campaigns/{}", self.base_url.trim_end_matches('/'), id)
    }
}

#[async_trait]
impl CampaignLedger for CampaignClient {
    async fn get_campaign(&self, id: i64) -> ClientResult<Campaign> {
        let url = self.campaign_url(id);
        let client = self.client.clone();

        self.circuit_breaker
            .call_with(ClientError::is_transient, async move {
                let response = client.get(&url).send().await?;
                read_json::<Campaign>(response, &format!("campaign {}", id)).await
            })
            .await
            .map_err(|e| reject(e, "campaign service"))
    }

    async fn credit_collected(
        &self,
        id: i64,
        credit: &LedgerCredit,
    ) -> ClientResult<CreditReceipt> {
        let url = format!("{}/credits", self.campaign_url(id));
        let client = self.client.clone();
        let credit = credit.clone();

        self.circuit_breaker
            .call_with(ClientError::is_transient, async move {
                let response = client.post(&url).json(&credit).send().await?;
                read_json::<CreditReceipt>(response, &format!("campaign {}", id)).await
            })
            .await
            .map_err(|e| reject(e, "campaign service"))
    }
}
