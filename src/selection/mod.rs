//! Candidate selection policy
//!
//! Turns a capability request into an ordered list of providers to try.
//! Providers are filtered (circuit, budget, language) and the survivors are
//! ranked by a weighted cost/latency/reliability score.

pub mod error;
pub mod scoring;

pub use error::SelectionError;
pub use scoring::{normalize, score_candidate, ScoringWeights};

use crate::budget::{Admission, BudgetGovernor};
use crate::health::{CircuitState, HealthTracker};
use crate::registry::{ProviderDescriptor, Registry};
use crate::request::CapabilityRequest;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Why a provider was left out of the candidate list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExclusionReason {
    CircuitOpen,
    ProbeInFlight,
    OverMaxCost { estimated: f64, max_cost: f64 },
    SpendCapReached,
    RateLimited,
    LanguageUnsupported { language: String },
}

impl ExclusionReason {
    /// Budget reasons turn an empty result into `BudgetExceeded`.
    pub fn is_budget(&self) -> bool {
        matches!(
            self,
            ExclusionReason::OverMaxCost { .. }
                | ExclusionReason::SpendCapReached
                | ExclusionReason::RateLimited
        )
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::CircuitOpen => write!(f, "circuit open"),
            ExclusionReason::ProbeInFlight => write!(f, "half-open probe already in flight"),
            ExclusionReason::OverMaxCost {
                estimated,
                max_cost,
            } => write!(f, "estimated cost {} exceeds max_cost {}", estimated, max_cost),
            ExclusionReason::SpendCapReached => write!(f, "window spend cap reached"),
            ExclusionReason::RateLimited => write!(f, "window request limit reached"),
            ExclusionReason::LanguageUnsupported { language } => {
                write!(f, "language '{}' not supported", language)
            }
        }
    }
}

/// A provider excluded from selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exclusion {
    pub provider_id: String,
    #[serde(flatten)]
    pub reason: ExclusionReason,
}

/// A provider that survived filtering, with the inputs to its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub provider_id: String,
    pub estimated_cost: f64,
    pub p95_latency_ms: u64,
    pub success_rate: f64,
    pub score: f64,
}

/// Ordered candidates plus what was excluded and why.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub candidates: Vec<Candidate>,
    pub exclusions: Vec<Exclusion>,
}

impl Selection {
    pub fn provider_ids(&self) -> Vec<String> {
        self.candidates
            .iter()
            .map(|c| c.provider_id.clone())
            .collect()
    }
}

/// Selects and orders providers for a request.
pub struct SelectionEngine {
    registry: Arc<Registry>,
    health: Arc<HealthTracker>,
    budget: Arc<BudgetGovernor>,
    weights: ScoringWeights,
}

impl SelectionEngine {
    pub fn new(
        registry: Arc<Registry>,
        health: Arc<HealthTracker>,
        budget: Arc<BudgetGovernor>,
        weights: ScoringWeights,
    ) -> Self {
        Self {
            registry,
            health,
            budget,
            weights,
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Ordered candidates for `request`; the first is the primary.
    ///
    /// # Errors
    ///
    /// - `UnknownCapability` if the capability is not registered
    /// - `BudgetExceeded` if every provider was excluded for budget reasons
    /// - `NoEligibleProvider` if every provider was excluded otherwise
    pub fn candidates(&self, request: &CapabilityRequest) -> Result<Selection, SelectionError> {
        if !self.registry.has_capability(&request.capability) {
            return Err(SelectionError::UnknownCapability(
                request.capability.clone(),
            ));
        }

        let mut eligible: Vec<(ProviderDescriptor, f64)> = Vec::new();
        let mut exclusions = Vec::new();

        for descriptor in self.registry.resolve(&request.capability) {
            let estimated = descriptor.estimate_cost(&request.payload);
            match self.exclusion_reason(&descriptor, request, estimated) {
                Some(reason) => {
                    tracing::debug!(
                        provider_id = %descriptor.id,
                        capability = %request.capability,
                        reason = %reason,
                        "Provider excluded"
                    );
                    exclusions.push(Exclusion {
                        provider_id: descriptor.id.clone(),
                        reason,
                    });
                }
                None => eligible.push((descriptor, estimated)),
            }
        }

        if eligible.is_empty() {
            let capability = request.capability.clone();
            let budget_only =
                !exclusions.is_empty() && exclusions.iter().all(|e| e.reason.is_budget());
            return Err(if budget_only {
                SelectionError::BudgetExceeded {
                    capability,
                    exclusions,
                }
            } else {
                SelectionError::NoEligibleProvider {
                    capability,
                    exclusions,
                }
            });
        }

        let candidates = self.rank(eligible);

        tracing::debug!(
            capability = %request.capability,
            candidates = ?candidates.iter().map(|c| c.provider_id.as_str()).collect::<Vec<_>>(),
            excluded = exclusions.len(),
            "Candidates selected"
        );

        Ok(Selection {
            candidates,
            exclusions,
        })
    }

    fn exclusion_reason(
        &self,
        descriptor: &ProviderDescriptor,
        request: &CapabilityRequest,
        estimated: f64,
    ) -> Option<ExclusionReason> {
        if !self.health.is_selectable(&descriptor.id) {
            return Some(match self.health.circuit_state(&descriptor.id) {
                CircuitState::HalfOpen => ExclusionReason::ProbeInFlight,
                _ => ExclusionReason::CircuitOpen,
            });
        }

        // Checked before budget so an unservable provider never counts as a
        // budget exclusion
        if let Some(language) = &request.constraints.required_language {
            if !descriptor.supports_language(language) {
                return Some(ExclusionReason::LanguageUnsupported {
                    language: language.clone(),
                });
            }
        }

        if let Some(max_cost) = request.constraints.max_cost {
            if estimated > max_cost {
                return Some(ExclusionReason::OverMaxCost {
                    estimated,
                    max_cost,
                });
            }
        }
        match self.budget.check(&descriptor.id, estimated) {
            Admission::Admitted => {}
            Admission::SpendCapReached => return Some(ExclusionReason::SpendCapReached),
            Admission::RateLimited => return Some(ExclusionReason::RateLimited),
        }

        None
    }

    fn rank(&self, eligible: Vec<(ProviderDescriptor, f64)>) -> Vec<Candidate> {
        let stats: Vec<(ProviderDescriptor, f64, Duration, f64)> = eligible
            .into_iter()
            .map(|(descriptor, estimated)| {
                let p95 = self
                    .health
                    .latency_p95(&descriptor.id)
                    .unwrap_or_else(|| descriptor.declared_latency());
                let success_rate = self.health.success_rate(&descriptor.id).unwrap_or(1.0);
                (descriptor, estimated, p95, success_rate)
            })
            .collect();

        let max_cost = stats.iter().map(|s| s.1).fold(0.0, f64::max);
        let max_p95 = stats
            .iter()
            .map(|s| s.2.as_secs_f64())
            .fold(0.0, f64::max);

        let mut candidates: Vec<Candidate> = stats
            .into_iter()
            .map(|(descriptor, estimated, p95, success_rate)| Candidate {
                score: score_candidate(
                    normalize(estimated, max_cost),
                    normalize(p95.as_secs_f64(), max_p95),
                    success_rate,
                    &self.weights,
                ),
                provider_id: descriptor.id,
                estimated_cost: estimated,
                p95_latency_ms: p95.as_millis() as u64,
                success_rate,
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.score
                .total_cmp(&b.score)
                .then_with(|| a.provider_id.cmp(&b.provider_id))
        });
        candidates
    }
}
