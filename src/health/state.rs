//! Per-provider health state tracking.

use super::config::CircuitBreakerConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Provider takes normal traffic
    Closed,
    /// Provider is excluded until the cooldown elapses
    Open,
    /// Cooldown elapsed; one probe decides between Closed and Open
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one attempt as far as provider health is concerned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttemptOutcome {
    Success { latency: Duration },
    Failure,
}

/// Tracks health for a single provider.
#[derive(Debug, Clone)]
pub struct ProviderHealth {
    pub consecutive_failures: u32,
    /// When the current failure streak began
    pub streak_started_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub circuit_state: CircuitState,
    pub opened_at: Option<DateTime<Utc>>,
    /// A half-open probe has been handed out and not yet resolved
    pub probe_in_flight: bool,
    latencies_ms: VecDeque<u64>,
    outcomes: VecDeque<bool>,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            streak_started_at: None,
            last_failure_at: None,
            last_success_at: None,
            circuit_state: CircuitState::Closed,
            opened_at: None,
            probe_in_flight: false,
            latencies_ms: VecDeque::new(),
            outcomes: VecDeque::new(),
        }
    }
}

impl ProviderHealth {
    /// Move an open circuit to half-open once the cooldown has elapsed.
    /// Returns Some(new_state) if a transition occurred.
    pub fn refresh(
        &mut self,
        now: DateTime<Utc>,
        config: &CircuitBreakerConfig,
    ) -> Option<CircuitState> {
        if self.circuit_state != CircuitState::Open {
            return None;
        }
        let opened_at = self.opened_at?;
        if now - opened_at >= config.cooldown() {
            self.circuit_state = CircuitState::HalfOpen;
            self.probe_in_flight = false;
            return Some(CircuitState::HalfOpen);
        }
        None
    }

    /// Whether selection may consider this provider right now.
    pub fn is_selectable(&self) -> bool {
        match self.circuit_state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => !self.probe_in_flight,
        }
    }

    /// Claim permission to send an attempt. In half-open this reserves the
    /// single probe; later callers are refused until it resolves.
    pub fn begin_attempt(&mut self) -> bool {
        match self.circuit_state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen if self.probe_in_flight => false,
            CircuitState::HalfOpen => {
                self.probe_in_flight = true;
                true
            }
        }
    }

    /// Give back a claimed probe without judging the provider.
    pub fn release_probe(&mut self) {
        self.probe_in_flight = false;
    }

    /// Apply an attempt outcome and determine if the circuit should transition.
    /// Returns Some(new_state) if a transition occurred, None otherwise.
    pub fn apply_outcome(
        &mut self,
        outcome: AttemptOutcome,
        now: DateTime<Utc>,
        config: &CircuitBreakerConfig,
    ) -> Option<CircuitState> {
        match outcome {
            AttemptOutcome::Success { latency } => {
                self.consecutive_failures = 0;
                self.streak_started_at = None;
                self.last_success_at = Some(now);
                push_bounded(
                    &mut self.latencies_ms,
                    latency.as_millis() as u64,
                    config.latency_window,
                );
                push_bounded(&mut self.outcomes, true, config.success_window);

                match self.circuit_state {
                    CircuitState::HalfOpen => {
                        self.circuit_state = CircuitState::Closed;
                        self.probe_in_flight = false;
                        self.opened_at = None;
                        Some(CircuitState::Closed)
                    }
                    _ => None,
                }
            }
            AttemptOutcome::Failure => {
                push_bounded(&mut self.outcomes, false, config.success_window);
                self.last_failure_at = Some(now);

                let streak_expired = self
                    .streak_started_at
                    .is_some_and(|start| now - start > config.failure_window());
                if self.consecutive_failures == 0 || streak_expired {
                    self.consecutive_failures = 1;
                    self.streak_started_at = Some(now);
                } else {
                    self.consecutive_failures += 1;
                }

                match self.circuit_state {
                    CircuitState::HalfOpen => {
                        self.open(now);
                        Some(CircuitState::Open)
                    }
                    CircuitState::Closed
                        if self.consecutive_failures >= config.failure_threshold =>
                    {
                        self.open(now);
                        Some(CircuitState::Open)
                    }
                    _ => None,
                }
            }
        }
    }

    fn open(&mut self, now: DateTime<Utc>) {
        self.circuit_state = CircuitState::Open;
        self.opened_at = Some(now);
        self.probe_in_flight = false;
    }

    pub fn latency_p50(&self) -> Option<Duration> {
        percentile(&self.latencies_ms, 50)
    }

    pub fn latency_p95(&self) -> Option<Duration> {
        percentile(&self.latencies_ms, 95)
    }

    /// Share of successes among recent outcomes; None before any attempt.
    pub fn success_rate(&self) -> Option<f64> {
        if self.outcomes.is_empty() {
            return None;
        }
        let successes = self.outcomes.iter().filter(|ok| **ok).count();
        Some(successes as f64 / self.outcomes.len() as f64)
    }

    pub fn sample_count(&self) -> usize {
        self.outcomes.len()
    }
}

fn push_bounded<T>(window: &mut VecDeque<T>, value: T, capacity: usize) {
    window.push_back(value);
    while window.len() > capacity {
        window.pop_front();
    }
}

/// Nearest-rank percentile.
fn percentile(samples: &VecDeque<u64>, pct: usize) -> Option<Duration> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted: Vec<u64> = samples.iter().copied().collect();
    sorted.sort_unstable();
    let rank = (pct * sorted.len()).div_ceil(100).max(1);
    Some(Duration::from_millis(sorted[rank - 1]))
}
