//! Provider health tracking and circuit breaking.
//!
//! Health is fed passively by dispatch outcomes; there is no background
//! polling. Each provider's state sits behind its own lock so concurrent
//! requests against different providers never contend.

mod config;
mod state;


pub use config::*;
pub use state::*;

use crate::clock::SharedClock;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Point-in-time view of one provider's health.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub provider_id: String,
    pub circuit_state: CircuitState,
    pub consecutive_failures: u32,
    pub probe_in_flight: bool,
    pub latency_p50_ms: Option<u64>,
    pub latency_p95_ms: Option<u64>,
    pub success_rate: Option<f64>,
    pub samples: usize,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
}

/// Shared registry of per-provider health.
pub struct HealthTracker {
    config: CircuitBreakerConfig,
    clock: SharedClock,
    providers: DashMap<String, Arc<Mutex<ProviderHealth>>>,
}

impl HealthTracker {
    pub fn new(config: CircuitBreakerConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            providers: DashMap::new(),
        }
    }

    /// Create tracking state for every id up front.
    pub fn with_providers<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            self.providers.entry(id.into()).or_default();
        }
        self
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn entry(&self, provider_id: &str) -> Arc<Mutex<ProviderHealth>> {
        if let Some(entry) = self.providers.get(provider_id) {
            return Arc::clone(entry.value());
        }
        Arc::clone(
            self.providers
                .entry(provider_id.to_string())
                .or_default()
                .value(),
        )
    }

    /// Current circuit state, applying any due cooldown transition.
    pub fn circuit_state(&self, provider_id: &str) -> CircuitState {
        let entry = self.entry(provider_id);
        let mut health = entry.lock();
        self.refresh(provider_id, &mut health);
        health.circuit_state
    }

    /// Whether selection may list this provider as a candidate.
    pub fn is_selectable(&self, provider_id: &str) -> bool {
        let entry = self.entry(provider_id);
        let mut health = entry.lock();
        self.refresh(provider_id, &mut health);
        health.is_selectable()
    }

    /// Claim permission to dispatch an attempt to the provider.
    ///
    /// In half-open this reserves the single probe; the caller must then
    /// report the outcome via `record_success`/`record_failure` or give the
    /// probe back with `release`.
    pub fn try_begin_attempt(&self, provider_id: &str) -> bool {
        let entry = self.entry(provider_id);
        let mut health = entry.lock();
        self.refresh(provider_id, &mut health);
        let allowed = health.begin_attempt();
        if allowed && health.circuit_state == CircuitState::HalfOpen {
            tracing::info!(provider_id = %provider_id, "Dispatching half-open probe");
        }
        allowed
    }

    pub fn record_success(&self, provider_id: &str, latency: Duration) {
        self.apply(provider_id, AttemptOutcome::Success { latency });
    }

    pub fn record_failure(&self, provider_id: &str) {
        self.apply(provider_id, AttemptOutcome::Failure);
    }

    /// End an attempt whose outcome says nothing about the provider.
    pub fn release(&self, provider_id: &str) {
        self.entry(provider_id).lock().release_probe();
    }

    fn apply(&self, provider_id: &str, outcome: AttemptOutcome) {
        let now = self.clock.now();
        let entry = self.entry(provider_id);
        let mut health = entry.lock();
        if let Some(new_state) = health.apply_outcome(outcome, now, &self.config) {
            self.log_transition(provider_id, new_state, &health);
        }
    }

    fn refresh(&self, provider_id: &str, health: &mut ProviderHealth) {
        if let Some(new_state) = health.refresh(self.clock.now(), &self.config) {
            self.log_transition(provider_id, new_state, health);
        }
    }

    fn log_transition(&self, provider_id: &str, new_state: CircuitState, health: &ProviderHealth) {
        match new_state {
            CircuitState::Open => tracing::warn!(
                provider_id = %provider_id,
                consecutive_failures = health.consecutive_failures,
                cooldown_seconds = self.config.cooldown_seconds,
                "Circuit opened"
            ),
            CircuitState::HalfOpen => {
                tracing::info!(provider_id = %provider_id, "Circuit half-open, awaiting probe")
            }
            CircuitState::Closed => tracing::info!(provider_id = %provider_id, "Circuit closed"),
        }
        metrics::counter!("conduit_circuit_transitions_total",
            "provider" => crate::metrics::sanitize_label(provider_id),
            "state" => new_state.as_str()
        )
        .increment(1);
    }

    /// p95 latency over recent successes, if any were recorded.
    pub fn latency_p95(&self, provider_id: &str) -> Option<Duration> {
        self.entry(provider_id).lock().latency_p95()
    }

    /// Recent success rate, if any attempts were recorded.
    pub fn success_rate(&self, provider_id: &str) -> Option<f64> {
        self.entry(provider_id).lock().success_rate()
    }

    pub fn snapshot(&self, provider_id: &str) -> HealthSnapshot {
        let entry = self.entry(provider_id);
        let mut health = entry.lock();
        self.refresh(provider_id, &mut health);
        HealthSnapshot {
            provider_id: provider_id.to_string(),
            circuit_state: health.circuit_state,
            consecutive_failures: health.consecutive_failures,
            probe_in_flight: health.probe_in_flight,
            latency_p50_ms: health.latency_p50().map(|d| d.as_millis() as u64),
            latency_p95_ms: health.latency_p95().map(|d| d.as_millis() as u64),
            success_rate: health.success_rate(),
            samples: health.sample_count(),
            last_success_at: health.last_success_at,
            last_failure_at: health.last_failure_at,
        }
    }

    /// Snapshots for every tracked provider, sorted by id.
    pub fn snapshots(&self) -> Vec<HealthSnapshot> {
        let mut ids: Vec<String> = self.providers.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids.iter().map(|id| self.snapshot(id)).collect()
    }
}
