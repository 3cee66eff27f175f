//! Configuration module for Conduit
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`CONDUIT_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use conduit::config::ConduitConfig;
//!
//! let toml = r#"
//! [server]
//! port = 9000
//!
//! [[capabilities]]
//! name = "text_classification"
//! cacheable = true
//!
//! [[providers]]
//! id = "local"
//! adapter = "static"
//! capabilities = ["text_classification"]
//! "#;
//! let config: ConduitConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.server.port, 9000);
//! assert!(config.validate().is_ok());
//! ```

pub mod budget;
pub mod cache;
pub mod capability;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod provider;
pub mod selection;
pub mod server;

pub use budget::BudgetConfig;
pub use cache::CacheConfig;
pub use capability::CapabilityConfig;
pub use dispatch::DispatchConfig;
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use provider::ProviderConfig;
pub use selection::{SelectionConfig, SelectionWeights};
pub use server::ServerConfig;

// Re-export CircuitBreakerConfig from health module
pub use crate::health::CircuitBreakerConfig;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Upper bound for durations configured in seconds (ten years).
pub const MAX_DURATION_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

/// Reject second counts too large to represent as a signed duration.
pub(crate) fn check_seconds(field: impl Into<String>, seconds: u64) -> Result<(), ConfigError> {
    if seconds > MAX_DURATION_SECONDS {
        return Err(ConfigError::validation(
            field,
            format!("must be at most {} seconds", MAX_DURATION_SECONDS),
        ));
    }
    Ok(())
}

/// Unified configuration for the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConduitConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Candidate scoring
    pub selection: SelectionConfig,
    /// Retry, timeout and coalescing
    pub dispatch: DispatchConfig,
    /// Circuit breaker thresholds
    pub circuit_breaker: CircuitBreakerConfig,
    /// Spend and rate windows
    pub budget: BudgetConfig,
    /// Result cache
    pub cache: CacheConfig,
    /// Declared capabilities
    pub capabilities: Vec<CapabilityConfig>,
    /// Provider definitions
    pub providers: Vec<ProviderConfig>,
}

impl ConduitConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supports CONDUIT_* environment variables for common settings.
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("CONDUIT_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(host) = std::env::var("CONDUIT_HOST") {
            self.server.host = host;
        }

        if let Ok(level) = std::env::var("CONDUIT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CONDUIT_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(cache) = std::env::var("CONDUIT_CACHE") {
            self.cache.enabled = cache.to_lowercase() == "true";
        }
        if let Ok(attempts) = std::env::var("CONDUIT_MAX_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.dispatch.max_attempts = n;
            }
        }

        self
    }

    /// Look up a capability definition by name
    pub fn capability(&self, name: &str) -> Option<&CapabilityConfig> {
        self.capabilities.iter().find(|c| c.name == name)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::validation(
                "server.port",
                "port must be non-zero",
            ));
        }

        if self.dispatch.max_attempts == 0 {
            return Err(ConfigError::validation(
                "dispatch.max_attempts",
                "at least one attempt is required",
            ));
        }
        if self.dispatch.default_attempt_timeout_ms == 0 || self.dispatch.request_deadline_ms == 0
        {
            return Err(ConfigError::validation(
                "dispatch",
                "timeouts must be greater than zero",
            ));
        }

        check_seconds(
            "dispatch.idempotency_ttl_seconds",
            self.dispatch.idempotency_ttl_seconds,
        )?;
        check_seconds("cache.default_ttl_seconds", self.cache.default_ttl_seconds)?;

        self.selection.weights.validate()?;
        self.circuit_breaker.validate()?;
        self.budget.validate()?;

        if self.cache.enabled && (self.cache.capacity == 0 || self.cache.shards == 0) {
            return Err(ConfigError::validation(
                "cache.capacity",
                "capacity and shards must be non-zero when the cache is enabled",
            ));
        }

        let mut declared = HashSet::new();
        for (i, capability) in self.capabilities.iter().enumerate() {
            if capability.name.trim().is_empty() {
                return Err(ConfigError::validation(
                    format!("capabilities[{}].name", i),
                    "name cannot be empty",
                ));
            }
            if let Some(ttl) = capability.cache_ttl_seconds {
                check_seconds(format!("capabilities[{}].cache_ttl_seconds", i), ttl)?;
            }
            if !declared.insert(capability.name.as_str()) {
                return Err(ConfigError::validation(
                    format!("capabilities[{}].name", i),
                    format!("duplicate capability '{}'", capability.name),
                ));
            }
        }

        let mut ids = HashSet::new();
        let mut served = HashSet::new();
        for (i, provider) in self.providers.iter().enumerate() {
            if provider.id.trim().is_empty() {
                return Err(ConfigError::validation(
                    format!("providers[{}].id", i),
                    "id cannot be empty",
                ));
            }
            if !ids.insert(provider.id.as_str()) {
                return Err(ConfigError::validation(
                    format!("providers[{}].id", i),
                    format!("duplicate provider id '{}'", provider.id),
                ));
            }
            if provider.capabilities.is_empty() {
                return Err(ConfigError::validation(
                    format!("providers[{}].capabilities", i),
                    "provider must serve at least one capability",
                ));
            }
            for capability in &provider.capabilities {
                if !declared.contains(capability.as_str()) {
                    return Err(ConfigError::UndeclaredCapability {
                        provider: provider.id.clone(),
                        capability: capability.clone(),
                    });
                }
                served.insert(capability.as_str());
            }
            provider
                .cost
                .validate()
                .map_err(|message| ConfigError::validation(format!("providers[{}].cost", i), message))?;
            if let Some(cap) = provider.spend_cap {
                if !cap.is_finite() || cap < 0.0 {
                    return Err(ConfigError::validation(
                        format!("providers[{}].spend_cap", i),
                        "cap must be >= 0.0",
                    ));
                }
            }
            if provider.timeout_ms == Some(0) {
                return Err(ConfigError::validation(
                    format!("providers[{}].timeout_ms", i),
                    "timeout must be greater than zero",
                ));
            }
        }

        if let Some(orphan) = self
            .capabilities
            .iter()
            .find(|c| !served.contains(c.name.as_str()))
        {
            return Err(ConfigError::OrphanCapability(orphan.name.clone()));
        }

        Ok(())
    }
}
