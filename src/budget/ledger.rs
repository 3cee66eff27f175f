//! Per-provider ledger entries for fixed budget windows.

use crate::config::MAX_DURATION_SECONDS;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

/// Limits applied to one provider per window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProviderLimits {
    /// Maximum committed spend per window (None = unlimited)
    pub spend_cap: Option<f64>,
    /// Maximum dispatched attempts per window (None = unlimited)
    pub max_requests: Option<u64>,
}

/// Why the governor would refuse an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    Admitted,
    /// The estimated cost does not fit under the window's spend cap
    SpendCapReached,
    /// The window's request allowance is used up
    RateLimited,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Admission::Admitted => "admitted",
            Admission::SpendCapReached => "spend_cap_reached",
            Admission::RateLimited => "rate_limited",
        }
    }
}

/// Budget held for one in-flight attempt.
///
/// Must be settled with `BudgetGovernor::commit` or `BudgetGovernor::release`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub provider_id: String,
    pub window_start: DateTime<Utc>,
    pub estimated: f64,
}

/// Spend and request accounting for one provider in the current window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub provider_id: String,
    pub window_start: DateTime<Utc>,
    /// Committed spend; never exceeds the cap
    pub spend_accumulated: f64,
    /// Estimated cost of attempts still in flight
    pub reserved: f64,
    /// Attempts dispatched this window
    pub request_count: u64,
    /// Billed cost that did not fit under the cap
    pub overage: f64,
}

impl LedgerEntry {
    pub fn new(provider_id: impl Into<String>, window_start: DateTime<Utc>) -> Self {
        Self {
            provider_id: provider_id.into(),
            window_start,
            spend_accumulated: 0.0,
            reserved: 0.0,
            request_count: 0,
            overage: 0.0,
        }
    }

    /// Reset the counters if `window_start` has moved on.
    /// Returns true if a rollover happened.
    pub fn roll_over(&mut self, window_start: DateTime<Utc>) -> bool {
        if self.window_start == window_start {
            return false;
        }
        self.window_start = window_start;
        self.spend_accumulated = 0.0;
        self.reserved = 0.0;
        self.request_count = 0;
        self.overage = 0.0;
        true
    }

    pub fn check(&self, estimated: f64, limits: &ProviderLimits) -> Admission {
        if let Some(max) = limits.max_requests {
            if self.request_count >= max {
                return Admission::RateLimited;
            }
        }
        if let Some(cap) = limits.spend_cap {
            if self.spend_accumulated + self.reserved + estimated > cap {
                return Admission::SpendCapReached;
            }
        }
        Admission::Admitted
    }

    /// Book `actual` against the window, clamping at the cap.
    pub fn book(&mut self, actual: f64, limits: &ProviderLimits) {
        let total = self.spend_accumulated + actual;
        match limits.spend_cap {
            Some(cap) if total > cap => {
                self.overage += total - cap;
                self.spend_accumulated = cap.max(self.spend_accumulated);
            }
            _ => self.spend_accumulated = total,
        }
    }

    pub fn remaining(&self, limits: &ProviderLimits) -> Option<f64> {
        limits
            .spend_cap
            .map(|cap| (cap - self.spend_accumulated - self.reserved).max(0.0))
    }
}

/// Start of the fixed, epoch-aligned window containing `now`.
pub fn window_start_for(now: DateTime<Utc>, window_seconds: u64) -> DateTime<Utc> {
    let window = window_seconds.clamp(1, MAX_DURATION_SECONDS) as i64;
    let ts = now.timestamp();
    let start = ts - ts.rem_euclid(window);
    Utc.timestamp_opt(start, 0).single().unwrap_or(now)
}
