//! HTTP/JSON clients for the identity and campaign services.

pub mod campaign;
pub mod identity;

pub use campaign::CampaignClient;
pub use identity::IdentityClient;

use failsafe::{backoff, failure_policy, Config, StateMachine};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::ports::ClientError;

pub(crate) type Breaker =
    StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

pub(crate) const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
pub(crate) const DEFAULT_RESET_TIMEOUT_SECS: u64 = 60;

pub(crate) fn circuit_breaker(failure_threshold: u32, reset_timeout_secs: u64) -> Breaker {
    let backoff = backoff::equal_jittered(
        Duration::from_secs(reset_timeout_secs),
        Duration::from_secs(reset_timeout_secs * 2),
    );
    let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
    Config::new().failure_policy(policy).build()
}

/// Builds a client with a whole-request deadline.
///
/// A builder failure means the TLS backend could not be set up; the default client
/// carries no deadline, so callers must keep their own outer timeout.
pub(crate) fn http_client(timeout: Duration) -> Client {
    Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        tracing::warn!(
            error = %e,
            ?timeout,
            "Failed to build HTTP client, falling back to defaults without a timeout"
        );
        Client::new()
    })
}

pub(crate) fn circuit_state(breaker: &Breaker) -> String {
    if breaker.is_call_permitted() {
        "closed".to_string()
    } else {
        "open".to_string()
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "error")]
    message: String,
}

/// Extracts a human-readable message from an error body, falling back to the raw text.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Maps an RPC response onto `T` or the matching `ClientError`.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
    resource: &str,
) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.text().await?;

    match status {
        s if s.is_success() => serde_json::from_str::<T>(&body)
            .map_err(|e| ClientError::InvalidResponse(format!("{}: {}", resource, e))),
        StatusCode::NOT_FOUND => Err(ClientError::NotFound(resource.to_string())),
        StatusCode::CONFLICT
        | StatusCode::UNPROCESSABLE_ENTITY
        | StatusCode::PRECONDITION_FAILED => {
            Err(ClientError::FailedPrecondition(error_message(&body)))
        }
        s => Err(ClientError::Remote {
            status: s.as_u16(),
            message: error_message(&body),
        }),
    }
}

pub(crate) fn reject(err: failsafe::Error<ClientError>, service: &str) -> ClientError {
    match err {
        failsafe::Error::Rejected => {
            ClientError::CircuitBreakerOpen(format!("{} circuit breaker is open", service))
        }
        failsafe::Error::Inner(e) => e,
    }
}
