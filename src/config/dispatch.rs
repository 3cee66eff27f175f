//! Dispatcher configuration

use super::MAX_DURATION_SECONDS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry, timeout and coalescing settings for the dispatcher.
///
/// # Example
///
/// ```toml
/// [dispatch]
/// max_attempts = 3
/// default_attempt_timeout_ms = 10000
/// request_deadline_ms = 30000
/// idempotency_ttl_seconds = 300
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Upper bound on attempts per request (primary + fallbacks).
    pub max_attempts: u32,

    /// Attempt timeout for providers that do not declare their own.
    pub default_attempt_timeout_ms: u64,

    /// Overall deadline across all attempts of one request.
    pub request_deadline_ms: u64,

    /// How long a successful outcome stays joinable by its idempotency key.
    pub idempotency_ttl_seconds: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            default_attempt_timeout_ms: 10_000,
            request_deadline_ms: 30_000,
            idempotency_ttl_seconds: 300,
        }
    }
}

impl DispatchConfig {
    pub fn default_attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.default_attempt_timeout_ms)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }

    pub fn idempotency_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.idempotency_ttl_seconds.min(MAX_DURATION_SECONDS) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_config_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.default_attempt_timeout(), Duration::from_secs(10));
        assert_eq!(config.request_deadline(), Duration::from_secs(30));
    }

    #[test]
    fn test_dispatch_config_partial_toml() {
        let config: DispatchConfig = toml::from_str("max_attempts = 5").unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.idempotency_ttl_seconds, 300);
    }
}
