use crate::config::{CapabilityConfig, ProviderConfig};
use crate::request::Payload;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a provider bills for one invocation.
///
/// Prices are in abstract cost units; the orchestrator never converts currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum CostModel {
    /// Flat price per call
    PerCall { price: f64 },
    /// Price per 1024 bytes of payload
    PerKilobyte { price: f64 },
    /// Price per 1000 characters of textual payload
    PerThousandChars { price: f64 },
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel::PerCall { price: 0.0 }
    }
}

impl CostModel {
    pub fn price(&self) -> f64 {
        match self {
            CostModel::PerCall { price }
            | CostModel::PerKilobyte { price }
            | CostModel::PerThousandChars { price } => *price,
        }
    }

    /// Estimated cost of invoking with `payload`.
    ///
    /// Non-textual payloads under `per_thousand_chars` are measured in bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use conduit::registry::CostModel;
    /// use conduit::request::Payload;
    ///
    /// let model = CostModel::PerThousandChars { price: 2.0 };
    /// let payload = Payload::text("a".repeat(500));
    /// assert_eq!(model.estimate(&payload), 1.0);
    /// ```
    pub fn estimate(&self, payload: &Payload) -> f64 {
        match self {
            CostModel::PerCall { price } => *price,
            CostModel::PerKilobyte { price } => price * (payload.len() as f64 / 1024.0),
            CostModel::PerThousandChars { price } => {
                let chars = match payload.as_text() {
                    Some(text) if payload.is_textual() => text.chars().count(),
                    _ => payload.len(),
                };
                price * (chars as f64 / 1000.0)
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let price = self.price();
        if !price.is_finite() || price < 0.0 {
            return Err(format!("price must be a finite value >= 0.0, got {}", price));
        }
        Ok(())
    }
}

/// Static description of a registered provider.
///
/// Built once from configuration at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: String,
    /// Adapter type name used to construct the provider
    pub adapter: String,
    pub capabilities: Vec<String>,
    pub cost_model: CostModel,
    pub declared_latency_ms: u64,
    /// Lowercased ISO codes; empty means language-agnostic
    pub languages: Vec<String>,
    /// Lower = listed first
    pub priority: i32,
    pub timeout_ms: Option<u64>,
    pub spend_cap: Option<f64>,
    pub max_requests_per_window: Option<u64>,
}

impl ProviderDescriptor {
    pub fn new(id: impl Into<String>, adapter: impl Into<String>, cost_model: CostModel) -> Self {
        Self {
            id: id.into(),
            adapter: adapter.into(),
            capabilities: Vec::new(),
            cost_model,
            declared_latency_ms: 1000,
            languages: Vec::new(),
            priority: 50,
            timeout_ms: None,
            spend_cap: None,
            max_requests_per_window: None,
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            id: config.id.clone(),
            adapter: config.adapter.clone(),
            capabilities: config.capabilities.clone(),
            cost_model: config.cost,
            declared_latency_ms: config.latency_ms,
            languages: config
                .languages
                .iter()
                .map(|l| l.trim().to_ascii_lowercase())
                .collect(),
            priority: config.priority,
            timeout_ms: config.timeout_ms,
            spend_cap: config.spend_cap,
            max_requests_per_window: config.max_requests_per_window,
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    pub fn with_languages(mut self, languages: &[&str]) -> Self {
        self.languages = languages.iter().map(|l| l.to_ascii_lowercase()).collect();
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.declared_latency_ms = latency_ms;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_spend_cap(mut self, cap: f64) -> Self {
        self.spend_cap = Some(cap);
        self
    }

    pub fn with_max_requests(mut self, max_requests: u64) -> Self {
        self.max_requests_per_window = Some(max_requests);
        self
    }

    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// Whether the provider can handle `language`.
    ///
    /// Regional tags fall back to their primary subtag (`en-GB` matches `en`).
    pub fn supports_language(&self, language: &str) -> bool {
        if self.languages.is_empty() {
            return true;
        }
        let wanted = language.trim().to_ascii_lowercase();
        let primary = wanted.split(['-', '_']).next().unwrap_or_default();
        self.languages
            .iter()
            .any(|l| *l == wanted || (!primary.is_empty() && *l == primary))
    }

    pub fn declared_latency(&self) -> Duration {
        Duration::from_millis(self.declared_latency_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn estimate_cost(&self, payload: &Payload) -> f64 {
        self.cost_model.estimate(payload)
    }
}

/// A declared capability with its effective cache policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDefinition {
    pub name: String,
    pub cacheable: bool,
    pub cache_ttl_seconds: u64,
}

impl CapabilityDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cacheable: false,
            cache_ttl_seconds: 0,
        }
    }

    pub fn cacheable(mut self, ttl: Duration) -> Self {
        self.cacheable = true;
        self.cache_ttl_seconds = ttl.as_secs();
        self
    }

    pub fn from_config(config: &CapabilityConfig, default_ttl_seconds: u64) -> Self {
        Self {
            name: config.name.clone(),
            cacheable: config.cacheable,
            cache_ttl_seconds: config.cache_ttl_seconds.unwrap_or(default_ttl_seconds),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}
