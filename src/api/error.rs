//! HTTP error envelope.
//!
//! Every failure leaves the API as
//! `{"error": {"code", "message", "provider_failures"}}` with a status
//! derived from the code.

use crate::dispatch::{DispatchError, ProviderFailure};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Status for "client closed request"; not in the http crate's constants.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Error response body.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub error: ApiErrorBody,
    #[serde(skip)]
    status: StatusCode,
}

/// Error details.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    pub provider_failures: Vec<ProviderFailure>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorBody {
                code: code.to_string(),
                message: message.into(),
                provider_failures: Vec::new(),
            },
            status,
        }
    }

    /// Create a bad request error (400).
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    /// Create an internal error (500).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    pub fn with_provider_failures(mut self, failures: Vec<ProviderFailure>) -> Self {
        self.error.provider_failures = failures;
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.status
    }
}

/// HTTP status for a dispatch error code.
pub fn status_for(error: &DispatchError) -> StatusCode {
    match error {
        DispatchError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
        DispatchError::InvalidInput { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        DispatchError::BudgetExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        DispatchError::NoEligibleProvider { .. } => StatusCode::SERVICE_UNAVAILABLE,
        DispatchError::AllProvidersExhausted { .. } => StatusCode::BAD_GATEWAY,
        DispatchError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
        DispatchError::Cancelled { .. } => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

impl From<DispatchError> for ApiError {
    fn from(error: DispatchError) -> Self {
        Self::new(status_for(&error), error.code(), error.to_string())
            .with_provider_failures(error.provider_failures())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
