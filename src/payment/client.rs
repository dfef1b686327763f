use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::Error as FailsafeError;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;
use thiserror::Error;

use crate::clients::{circuit_breaker, circuit_state, error_message, http_client, Breaker};
use crate::ports::PaymentProvider;

pub const DEFAULT_PROVIDER_URL: &str = "https://api.xendit.co";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("Payment provider unavailable: {0}")]
    Unavailable(String),
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),
    #[error("Invalid response from payment provider: {0}")]
    InvalidResponse(String),
    #[error("Payment provider error ({status}): {message}")]
    Provider { status: u16, message: String },
    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

impl PaymentError {
    fn is_transient(&self) -> bool {
        match self {
            PaymentError::Unavailable(_) => true,
            PaymentError::Provider { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::Unavailable(err.to_string())
    }
}

/// Invoice status vocabulary reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Settled,
    Expired,
    Other(String),
}

impl From<String> for InvoiceStatus {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "PENDING" => InvoiceStatus::Pending,
            "PAID" => InvoiceStatus::Paid,
            "SETTLED" => InvoiceStatus::Settled,
            "EXPIRED" => InvoiceStatus::Expired,
            _ => InvoiceStatus::Other(value),
        }
    }
}

impl From<InvoiceStatus> for String {
    fn from(status: InvoiceStatus) -> Self {
        match status {
            InvoiceStatus::Pending => "PENDING".to_string(),
            InvoiceStatus::Paid => "PAID".to_string(),
            InvoiceStatus::Settled => "SETTLED".to_string(),
            InvoiceStatus::Expired => "EXPIRED".to_string(),
            InvoiceStatus::Other(value) => value,
        }
    }
}

/// Body of `POST /v2/invoices`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateInvoiceRequest {
    /// Caller-stable reference, `donation-<id>`.
    pub external_id: String,
    #[serde(serialize_with = "serialize_amount")]
    pub amount: BigDecimal,
    pub payer_email: String,
    pub description: String,
}

fn serialize_amount<S: Serializer>(amount: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error> {
    match amount.to_f64() {
        Some(value) => serializer.serialize_f64(value),
        None => Err(serde::ser::Error::custom("amount is not representable")),
    }
}

/// Invoice as returned by both create and get.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    #[serde(default)]
    pub external_id: Option<String>,
    pub status: InvoiceStatus,
    #[serde(default)]
    pub invoice_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub payment_method: Option<String>,
}

/// HTTP client for the invoice-based payment provider.
///
/// Neither call is retried here; create-invoice is only safe to repeat with
/// the same `external_id`.
#[derive(Clone)]
pub struct InvoiceClient {
    client: Client,
    base_url: String,
    api_key: String,
    circuit_breaker: Breaker,
}

impl InvoiceClient {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Self {
        Self::with_circuit_breaker(base_url, api_key, timeout, 3, 60)
    }

    /// Creates a client with custom circuit breaker configuration
    pub fn with_circuit_breaker(
        base_url: String,
        api_key: String,
        timeout: Duration,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        InvoiceClient {
            client: http_client(timeout),
            base_url,
            api_key,
            circuit_breaker: circuit_breaker(failure_threshold, reset_timeout_secs),
        }
    }

    pub fn circuit_state(&self) -> String {
        circuit_state(&self.circuit_breaker)
    }

    fn invoices_url(&self) -> String {
        format!("{}/v2/invoices", self.base_url.trim_end_matches('/'))
    }

    async fn guarded<F>(&self, call: F) -> Result<Invoice, PaymentError>
    where
        F: std::future::Future<Output = Result<Invoice, PaymentError>>,
    {
        match self.circuit_breaker.call_with(PaymentError::is_transient, call).await {
            Ok(invoice) => Ok(invoice),
            Err(FailsafeError::Rejected) => Err(PaymentError::CircuitBreakerOpen(
                "Payment provider circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

async fn read_invoice(
    response: Response,
    invoice_id: Option<&str>,
) -> Result<Invoice, PaymentError> {
    let status = response.status();
    let body = response.text().await?;

    if status == StatusCode::NOT_FOUND {
        if let Some(id) = invoice_id {
            return Err(PaymentError::InvoiceNotFound(id.to_string()));
        }
    }

    if !status.is_success() {
        return Err(PaymentError::Provider {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    serde_json::from_str::<Invoice>(&body).map_err(|e| PaymentError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl PaymentProvider for InvoiceClient {
    async fn create_invoice(
        &self,
        request: &CreateInvoiceRequest,
    ) -> Result<Invoice, PaymentError> {
        let url = self.invoices_url();
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let request = request.clone();

        self.guarded(async move {
            let response = client
                .post(&url)
                .basic_auth(api_key, Some(""))
                .header("Accept", "application/json")
                .json(&request)
                .send()
                .await?;
            read_invoice(response, None).await
        })
        .await
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<Invoice, PaymentError> {
        let url = format!("{}/{}", self.invoices_url(), invoice_id);
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let id = invoice_id.to_string();

        self.guarded(async move {
            let response = client
                .get(&url)
                .basic_auth(api_key, Some(""))
                .header("Accept", "application/json")
                .send()
                .await?;
            read_invoice(response, Some(&id)).await
        })
        .await
    }
}
