//! # Metrics Collection Module
//!
//! Prometheus export for dispatch, provider and cache activity.
//!
//! ## Metrics Tracked
//!
//! **Counters:**
//! - `conduit_requests_total{capability, status}` - Terminal request outcomes
//! - `conduit_attempts_total{provider, outcome}` - Provider attempts
//! - `conduit_cache_hits_total{capability}` - Requests answered from cache
//! - `conduit_coalesced_total{capability}` - Requests that joined an in-flight call
//! - `conduit_circuit_transitions_total{provider, state}` - Circuit breaker transitions
//!
//! **Histograms:**
//! - `conduit_attempt_duration_seconds{provider}` - Attempt duration
//! - `conduit_spend_units{provider}` - Cost committed per successful attempt
//!
//! **Gauges:**
//! - `conduit_providers_total` - Registered providers
//! - `conduit_circuits_open` - Providers whose circuit is not closed
//! - `conduit_uptime_seconds` - Seconds since startup

pub mod handler;

// Re-export PrometheusBuilder for test compatibility
pub use metrics_exporter_prometheus::PrometheusBuilder;

use crate::health::{CircuitState, HealthTracker};
use crate::registry::Registry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;

/// Sanitize a value for use as a Prometheus label.
///
/// Replaces anything outside `[a-zA-Z0-9_]` with an underscore and prefixes
/// a leading digit, so provider ids like `whisper-eu:1` stay readable.
pub fn sanitize_label(label: &str) -> String {
    let mut sanitized = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();

    if sanitized.is_empty() || sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    sanitized
}

/// Central coordinator for gauge computation and rendering.
pub struct MetricsCollector {
    registry: Arc<Registry>,
    health: Arc<HealthTracker>,
    /// Startup time for uptime calculation
    start_time: Instant,
    /// Thread-safe cache for sanitized Prometheus labels
    label_cache: DashMap<String, String>,
    prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl MetricsCollector {
    pub fn new(
        registry: Arc<Registry>,
        health: Arc<HealthTracker>,
        start_time: Instant,
        prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
    ) -> Self {
        Self {
            registry,
            health,
            start_time,
            label_cache: DashMap::new(),
            prometheus_handle,
        }
    }

    /// Get sanitized Prometheus label (cached for performance).
    pub fn sanitize_label(&self, label: &str) -> String {
        if let Some(cached) = self.label_cache.get(label) {
            return cached.clone();
        }
        let sanitized = sanitize_label(label);
        self.label_cache
            .insert(label.to_string(), sanitized.clone());
        sanitized
    }

    /// Update gauges derived from the registry and health tracker.
    pub fn update_gauges(&self) {
        metrics::gauge!("conduit_providers_total").set(self.registry.provider_count() as f64);

        let open = self
            .registry
            .descriptors()
            .iter()
            .filter(|d| self.health.circuit_state(&d.id) != CircuitState::Closed)
            .count();
        metrics::gauge!("conduit_circuits_open").set(open as f64);
        metrics::gauge!("conduit_uptime_seconds").set(self.uptime_seconds() as f64);
    }

    /// Get uptime in seconds since startup.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Render Prometheus metrics in text format.
    pub fn render_metrics(&self) -> String {
        self.prometheus_handle.render()
    }
}

/// Initialize the Prometheus exporter with custom histogram buckets.
///
/// Duration buckets: [0.05, 0.1, 0.25, 0.5, 1, 2.5, 5, 10, 30] seconds.
/// Spend buckets: [0.001, 0.01, 0.1, 0.5, 1, 5, 10, 50, 100] cost units.
pub fn setup_metrics(
) -> Result<metrics_exporter_prometheus::PrometheusHandle, Box<dyn std::error::Error>> {
    use metrics_exporter_prometheus::Matcher;

    let duration_buckets = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];
    let spend_buckets = &[0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 50.0, 100.0];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("conduit_attempt_duration_seconds".to_string()),
            duration_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full("conduit_spend_units".to_string()),
            spend_buckets,
        )?
        .install_recorder()?;

    Ok(handle)
}
