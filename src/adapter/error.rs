//! Error types for adapter operations.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors a provider adapter can report for one invocation.
///
/// Adapters translate every provider-specific failure into one of these so
/// callers never see raw network or provider error shapes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    /// The provider rejected the caller's input. Retrying elsewhere will not help.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Network connectivity error (DNS, connection refused, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded its deadline.
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// Provider returned an error response.
    #[error("Provider error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Provider response doesn't match the expected format.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Adapter configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Capability not supported by this adapter.
    #[error("Capability '{0}' not supported by this adapter")]
    Unsupported(String),

    /// The invocation was cancelled by the caller.
    #[error("Invocation cancelled")]
    Cancelled,
}

impl AdapterError {
    /// Whether the dispatcher may try the next candidate after this error.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AdapterError::InvalidInput(_) | AdapterError::Cancelled)
    }

    /// Whether this error says something about the provider's health.
    ///
    /// Input rejections and cancellations are the caller's doing.
    pub fn counts_against_provider(&self) -> bool {
        self.is_retryable()
    }

    /// Short machine-readable kind used in logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            AdapterError::InvalidInput(_) => "invalid_input",
            AdapterError::Network(_) => "network",
            AdapterError::Timeout(_) => "timeout",
            AdapterError::Upstream { .. } => "upstream",
            AdapterError::InvalidResponse(_) => "invalid_response",
            AdapterError::Configuration(_) => "configuration",
            AdapterError::Unsupported(_) => "unsupported",
            AdapterError::Cancelled => "cancelled",
        }
    }

    pub(crate) fn from_reqwest(error: reqwest::Error, timeout_ms: u64) -> Self {
        if error.is_timeout() {
            AdapterError::Timeout(timeout_ms)
        } else {
            AdapterError::Network(error.to_string())
        }
    }

    /// Map a non-success HTTP status onto the error taxonomy.
    ///
    /// 400, 413, 415 and 422 mean the input itself was rejected; everything
    /// else (408, 429, 5xx, auth failures) is specific to this provider.
    pub(crate) fn from_status(status: StatusCode, body: &str) -> Self {
        let message = truncate(body, 200);
        match status.as_u16() {
            400 | 413 | 415 | 422 => AdapterError::InvalidInput(if message.is_empty() {
                status.to_string()
            } else {
                message
            }),
            code => AdapterError::Upstream {
                status: code,
                message: if message.is_empty() {
                    status.to_string()
                } else {
                    message
                },
            },
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
