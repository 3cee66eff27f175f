//! Scoring function for candidate ordering

/// Weights for scoring provider candidates.
///
/// `score = cost * normalized_cost + latency * normalized_p95 - success * success_rate`,
/// lower is better.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub cost: f64,
    pub latency: f64,
    pub success: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            cost: 0.5,
            latency: 0.3,
            success: 0.2,
        }
    }
}

impl ScoringWeights {
    /// Validate that weights are usable
    pub fn validate(&self) -> Result<(), String> {
        let weights = [self.cost, self.latency, self.success];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err("Scoring weights must be finite and >= 0".to_string());
        }
        if weights.iter().all(|w| *w == 0.0) {
            return Err("At least one scoring weight must be non-zero".to_string());
        }
        Ok(())
    }
}

/// Scale `value` into 0.0..=1.0 relative to the largest value among candidates.
pub fn normalize(value: f64, max: f64) -> f64 {
    if max <= 0.0 || !max.is_finite() {
        0.0
    } else {
        (value / max).clamp(0.0, 1.0)
    }
}

/// Score a candidate; lower is better.
pub fn score_candidate(
    normalized_cost: f64,
    normalized_p95: f64,
    success_rate: f64,
    weights: &ScoringWeights,
) -> f64 {
    weights.cost * normalized_cost + weights.latency * normalized_p95
        - weights.success * success_rate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_default_weights() {
        assert!(ScoringWeights::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_negative_weights() {
        let weights = ScoringWeights {
            cost: -0.1,
            latency: 0.5,
            success: 0.5,
        };
        assert!(weights.validate().is_err());
    }

    #[test]
    fn validate_rejects_all_zero() {
        let weights = ScoringWeights {
            cost: 0.0,
            latency: 0.0,
            success: 0.0,
        };
        assert!(weights.validate().is_err());
    }

    #[test]
    fn normalize_handles_zero_max() {
        assert_eq!(normalize(0.0, 0.0), 0.0);
        assert_eq!(normalize(2.0, 4.0), 0.5);
        assert_eq!(normalize(4.0, 4.0), 1.0);
    }

    #[test]
    fn score_prefers_cheaper() {
        let weights = ScoringWeights::default();
        assert!(score_candidate(0.2, 1.0, 1.0, &weights) < score_candidate(1.0, 1.0, 1.0, &weights));
    }

    #[test]
    fn score_prefers_faster() {
        let weights = ScoringWeights::default();
        assert!(score_candidate(1.0, 0.1, 1.0, &weights) < score_candidate(1.0, 0.9, 1.0, &weights));
    }

    #[test]
    fn score_prefers_reliable() {
        let weights = ScoringWeights::default();
        assert!(score_candidate(1.0, 1.0, 0.9, &weights) < score_candidate(1.0, 1.0, 0.3, &weights));
    }

    #[test]
    fn score_with_default_weights() {
        let weights = ScoringWeights::default();
        // 0.5 * 0.4 + 0.3 * 1.0 - 0.2 * 1.0
        let score = score_candidate(0.4, 1.0, 1.0, &weights);
        assert!((score - 0.3).abs() < 1e-9);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Raising only the cost never improves a candidate's score.
            #[test]
            fn prop_score_monotonic_in_cost(
                low in 0.0f64..1.0,
                delta in 0.0f64..1.0,
                p95 in 0.0f64..1.0,
                rate in 0.0f64..1.0,
            ) {
                let weights = ScoringWeights::default();
                let high = (low + delta).min(1.0);
                prop_assert!(
                    score_candidate(low, p95, rate, &weights)
                        <= score_candidate(high, p95, rate, &weights)
                );
            }
        }
    }
}
