//! Types passed across the adapter boundary.

use crate::request::Payload;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-invocation context handed to an adapter.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub capability: String,
    pub required_language: Option<String>,
    /// Budget for this attempt; adapters should not outlive it
    pub timeout: Duration,
    /// Fires when the caller gives up
    pub cancel: CancellationToken,
    pub request_id: Option<String>,
}

impl InvocationContext {
    pub fn new(capability: impl Into<String>, timeout: Duration) -> Self {
        Self {
            capability: capability.into(),
            required_language: None,
            timeout,
            cancel: CancellationToken::new(),
            request_id: None,
        }
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.required_language = language;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

/// Successful adapter result.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterOutput {
    pub result: Payload,
    /// Cost actually incurred, in the provider's cost units
    pub cost: f64,
}

impl AdapterOutput {
    pub fn new(result: Payload, cost: f64) -> Self {
        Self { result, cost }
    }
}
