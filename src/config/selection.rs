//! Selection policy configuration

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;

/// Candidate selection configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub weights: SelectionWeights,
}

/// Weights for the candidate score.
///
/// `score = cost * normalized_cost + latency * normalized_p95 - success * success_rate`,
/// lower is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionWeights {
    pub cost: f64,
    pub latency: f64,
    pub success: f64,
}

impl Default for SelectionWeights {
    fn default() -> Self {
        Self {
            cost: 0.5,
            latency: 0.3,
            success: 0.2,
        }
    }
}

impl SelectionWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("selection.weights.cost", self.cost),
            ("selection.weights.latency", self.latency),
            ("selection.weights.success", self.success),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::validation(
                    field,
                    "weight must be a non-negative number",
                ));
            }
        }
        if self.cost + self.latency + self.success == 0.0 {
            return Err(ConfigError::validation(
                "selection.weights",
                "at least one weight must be non-zero",
            ));
        }
        Ok(())
    }
}

impl From<SelectionWeights> for crate::selection::ScoringWeights {
    fn from(weights: SelectionWeights) -> Self {
        crate::selection::ScoringWeights {
            cost: weights.cost,
            latency: weights.latency,
            success: weights.success,
        }
    }
}
