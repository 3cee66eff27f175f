//! Provider configuration

use crate::registry::CostModel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One third-party provider and the capabilities it serves.
///
/// # Example
///
/// ```toml
/// [[providers]]
/// id = "whisper-cloud"
/// adapter = "openai"
/// url = "https://api.openai.com"
/// api_key_env = "OPENAI_API_KEY"
/// capabilities = ["speech_to_text"]
/// cost = { model = "per_kilobyte", price = 0.002 }
/// latency_ms = 1200
/// languages = ["en", "de", "es"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    /// Adapter type name (`http`, `openai`, `static`, or a custom registered type)
    pub adapter: String,
    #[serde(default)]
    pub url: String,
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub cost: CostModel,
    /// Declared typical latency, used until real samples exist
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
    /// Supported ISO language codes; empty means language-agnostic
    #[serde(default)]
    pub languages: Vec<String>,
    /// Registry ordering (lower = listed first)
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Per-attempt timeout; falls back to `dispatch.default_attempt_timeout_ms`
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Environment variable holding the provider credential
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Overrides `budget.default_spend_cap`
    #[serde(default)]
    pub spend_cap: Option<f64>,
    /// Overrides `budget.default_max_requests`
    #[serde(default)]
    pub max_requests_per_window: Option<u64>,
    /// Adapter-specific settings
    #[serde(default)]
    pub options: HashMap<String, serde_json::Value>,
}

fn default_priority() -> i32 {
    50
}

fn default_latency_ms() -> u64 {
    1000
}
