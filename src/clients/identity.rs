use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use reqwest::Client;
use std::time::Duration;

use super::{circuit_breaker, circuit_state, http_client, read_json, reject, Breaker};
use crate::domain::User;
use crate::ports::{ClientError, ClientResult, IdentityService};

/// RPC client for the identity service.
#[derive(Clone)]
pub struct IdentityClient {
    client: Client,
    base_url: String,
    circuit_breaker: Breaker,
}

impl IdentityClient {
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
        IdentityClient {
            client: http_client(timeout),
            base_url,
            circuit_breaker: circuit_breaker(failure_threshold, reset_timeout_secs),
        }
    }

    pub fn circuit_state(&self) -> String {
        circuit_state(&self.circuit_breaker)
    }
}

#[async_trait]
impl IdentityService for IdentityClient {
    async fn get_user(&self, id: i64) -> ClientResult<User> {
        let url = format!("{}/users/{}", self.base_url.trim_end_matches('/'), id);
        let client = self.client.clone();

        self.circuit_breaker
            .call_with(ClientError::is_transient, async move {
                let response = client.get(&url).send().await?;
                read_json::<User>(response, &format!("user {}", id)).await
            })
            .await
            .map_err(|e| reject(e, "identity service"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_client_creation() {
        let client =
            IdentityClient::new("http://identity.local/".to_string(), Duration::from_secs(5));
        assert_eq!(client.base_url, "http://identity.local/");
        assert_eq!(client.circuit_state(), "closed");
    }
}
