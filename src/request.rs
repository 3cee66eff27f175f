//! Capability request types shared by selection, dispatch and the API.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Opaque request or result content with its declared media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Payload {
    pub fn new(content_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// UTF-8 text payload (`text/plain`).
    pub fn text(text: impl Into<String>) -> Self {
        Self::new("text/plain", text.into().into_bytes())
    }

    /// JSON payload (`application/json`).
    pub fn json(value: &serde_json::Value) -> Self {
        Self::new("application/json", value.to_string().into_bytes())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the content type denotes JSON (including `+json` suffixes).
    pub fn is_json(&self) -> bool {
        let essence = self.essence();
        essence == "application/json" || essence.ends_with("+json")
    }

    /// Whether the content type denotes text that can be shown as a string.
    pub fn is_textual(&self) -> bool {
        self.essence().starts_with("text/") || self.is_json()
    }

    /// Content as UTF-8 text, if it is valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    /// Content parsed as JSON, if it is JSON.
    pub fn as_json(&self) -> Option<serde_json::Value> {
        if !self.is_json() {
            return None;
        }
        serde_json::from_slice(&self.data).ok()
    }

    /// Media type without parameters, lowercased (`text/plain; charset=utf-8` -> `text/plain`).
    pub fn essence(&self) -> String {
        self.content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }
}

/// Caller-supplied limits for a single request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    /// Upper bound on the estimated cost of the provider chosen.
    pub max_cost: Option<f64>,
    /// Upper bound on a single attempt's duration.
    pub max_latency: Option<Duration>,
    /// ISO language code every candidate must support.
    pub required_language: Option<String>,
    /// Requests sharing a key are coalesced into one provider call.
    pub idempotency_key: Option<String>,
    /// Overall deadline for the request across all attempts.
    pub deadline: Option<Duration>,
}

impl Constraints {
    pub fn with_max_cost(mut self, max_cost: f64) -> Self {
        self.max_cost = Some(max_cost);
        self
    }

    pub fn with_max_latency(mut self, max_latency: Duration) -> Self {
        self.max_latency = Some(max_latency);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.required_language = Some(language.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// A single capability invocation as submitted by calling code.
///
/// # Examples
///
/// ```
/// use conduit::request::{CapabilityRequest, Constraints, Payload};
///
/// let request = CapabilityRequest::new("text_classification", Payload::text("refund please"))
///     .with_constraints(Constraints::default().with_max_cost(2.0));
/// assert!(request.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityRequest {
    pub capability: String,
    pub payload: Payload,
    pub constraints: Constraints,
}

impl CapabilityRequest {
    pub fn new(capability: impl Into<String>, payload: Payload) -> Self {
        Self {
            capability: capability.into(),
            payload,
            constraints: Constraints::default(),
        }
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Structural checks that do not need the registry.
    pub fn validate(&self) -> Result<(), String> {
        if self.capability.trim().is_empty() {
            return Err("capability must not be empty".to_string());
        }
        if self.payload.content_type.trim().is_empty() {
            return Err("payload content_type must not be empty".to_string());
        }
        if self.payload.is_empty() {
            return Err("payload must not be empty".to_string());
        }
        if let Some(max_cost) = self.constraints.max_cost {
            if !max_cost.is_finite() || max_cost < 0.0 {
                return Err("max_cost must be a non-negative number".to_string());
            }
        }
        if self.constraints.max_latency == Some(Duration::ZERO) {
            return Err("max_latency must be greater than zero".to_string());
        }
        if let Some(key) = &self.constraints.idempotency_key {
            if key.trim().is_empty() {
                return Err("idempotency_key must not be blank".to_string());
            }
        }
        Ok(())
    }
}
