//! Budget and rate limit configuration

use serde::{Deserialize, Serialize};

use crate::config::check_seconds;
use crate::config::error::ConfigError;

/// Spend and rate windows shared by every provider.
///
/// Per-provider `spend_cap` / `max_requests_per_window` override the defaults here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Length of a fixed budget bucket in seconds (aligned to the Unix epoch)
    pub window_seconds: u64,

    /// Spend cap per provider per window, in cost units (None = unlimited)
    pub default_spend_cap: Option<f64>,

    /// Dispatched attempts allowed per provider per window (None = unlimited)
    pub default_max_requests: Option<u64>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            window_seconds: 3600,
            default_spend_cap: None,
            default_max_requests: None,
        }
    }
}

impl BudgetConfig {
    /// Validate configuration at startup
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_seconds == 0 {
            return Err(ConfigError::validation(
                "budget.window_seconds",
                "window must be at least one second",
            ));
        }
        check_seconds("budget.window_seconds", self.window_seconds)?;
        if let Some(cap) = self.default_spend_cap {
            if !cap.is_finite() || cap < 0.0 {
                return Err(ConfigError::validation(
                    "budget.default_spend_cap",
                    "cap must be >= 0.0",
                ));
            }
        }
        Ok(())
    }
}
