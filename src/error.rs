use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::payment::PaymentError;
use crate::ports::{ClientError, RepositoryError};
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::FailedPrecondition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => AppError::NotFound(what),
            RepositoryError::Conflict(what) => AppError::Conflict(what),
            RepositoryError::InvalidData(what) => AppError::Internal(what),
            RepositoryError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound(what) => AppError::NotFound(what),
            ClientError::FailedPrecondition(what) => AppError::FailedPrecondition(what),
            ClientError::Unavailable(what) | ClientError::CircuitBreakerOpen(what) => {
                AppError::Unavailable(what)
            }
            ClientError::InvalidResponse(what) => AppError::InvalidResponse(what),
            ClientError::Remote { status, message } => {
                AppError::Unavailable(format!("remote returned {}: {}", status, message))
            }
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Unavailable(what) | PaymentError::CircuitBreakerOpen(what) => {
                AppError::Unavailable(what)
            }
            PaymentError::InvoiceNotFound(id) => AppError::NotFound(format!("invoice {}", id)),
            PaymentError::InvalidResponse(what) => AppError::InvalidResponse(what),
            PaymentError::Provider { status, message } if status >= 500 => {
                AppError::Unavailable(format!("payment provider returned {}: {}", status, message))
            }
            PaymentError::Provider { message, .. } => AppError::FailedPrecondition(message),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::FailedPrecondition(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
