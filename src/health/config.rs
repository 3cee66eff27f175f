//! Configuration for the per-provider circuit breaker.

use crate::config::{check_seconds, ConfigError, MAX_DURATION_SECONDS};
use serde::{Deserialize, Serialize};

/// Circuit breaker thresholds and rolling statistic sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// A failure streak older than this many seconds starts over
    pub failure_window_seconds: u64,
    /// Seconds an open circuit waits before allowing a half-open probe
    pub cooldown_seconds: u64,
    /// Latency samples kept for p50/p95
    pub latency_window: usize,
    /// Outcomes kept for the recent success rate
    pub success_window: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            failure_window_seconds: 60,
            cooldown_seconds: 30,
            latency_window: 50,
            success_window: 20,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::validation(
                "circuit_breaker.failure_threshold",
                "threshold must be at least 1",
            ));
        }
        if self.failure_window_seconds == 0 {
            return Err(ConfigError::validation(
                "circuit_breaker.failure_window_seconds",
                "window must be greater than zero",
            ));
        }
        if self.cooldown_seconds == 0 {
            return Err(ConfigError::validation(
                "circuit_breaker.cooldown_seconds",
                "cooldown must be greater than zero",
            ));
        }
        check_seconds(
            "circuit_breaker.failure_window_seconds",
            self.failure_window_seconds,
        )?;
        check_seconds("circuit_breaker.cooldown_seconds", self.cooldown_seconds)?;
        if self.latency_window == 0 || self.success_window == 0 {
            return Err(ConfigError::validation(
                "circuit_breaker",
                "sample windows must hold at least one sample",
            ));
        }
        Ok(())
    }

    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cooldown_seconds.min(MAX_DURATION_SECONDS) as i64)
    }

    pub fn failure_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.failure_window_seconds.min(MAX_DURATION_SECONDS) as i64)
    }
}
