//! Budget and rate governor.
//!
//! Tracks spend and dispatched attempts per provider in fixed, epoch-aligned
//! windows. Windows roll over lazily the next time a provider's ledger is
//! touched. Refusals are plain values; nothing here returns an error.
//!
//! Every admitted attempt takes a [`Reservation`] for its estimated cost, so
//! concurrent requests cannot jointly overshoot a cap. Only successful
//! attempts turn their reservation into committed spend.

mod ledger;

pub use ledger::*;

use crate::clock::SharedClock;
use crate::config::BudgetConfig;
use crate::registry::ProviderDescriptor;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Per-provider spend and rate governor.
pub struct BudgetGovernor {
    window_seconds: u64,
    default_limits: ProviderLimits,
    clock: SharedClock,
    limits: DashMap<String, ProviderLimits>,
    ledgers: DashMap<String, Arc<Mutex<LedgerEntry>>>,
}

impl BudgetGovernor {
    pub fn new(config: &BudgetConfig, clock: SharedClock) -> Self {
        Self {
            window_seconds: config.window_seconds,
            default_limits: ProviderLimits {
                spend_cap: config.default_spend_cap,
                max_requests: config.default_max_requests,
            },
            clock,
            limits: DashMap::new(),
            ledgers: DashMap::new(),
        }
    }

    /// Apply a provider's own caps, falling back to the configured defaults.
    pub fn configure_provider(&self, descriptor: &ProviderDescriptor) {
        let limits = ProviderLimits {
            spend_cap: descriptor.spend_cap.or(self.default_limits.spend_cap),
            max_requests: descriptor
                .max_requests_per_window
                .or(self.default_limits.max_requests),
        };
        self.set_limits(&descriptor.id, limits);
    }

    pub fn set_limits(&self, provider_id: &str, limits: ProviderLimits) {
        self.limits.insert(provider_id.to_string(), limits);
    }

    pub fn limits(&self, provider_id: &str) -> ProviderLimits {
        self.limits
            .get(provider_id)
            .map(|l| *l.value())
            .unwrap_or(self.default_limits)
    }

    fn ledger(&self, provider_id: &str) -> Arc<Mutex<LedgerEntry>> {
        if let Some(entry) = self.ledgers.get(provider_id) {
            return Arc::clone(entry.value());
        }
        let window_start = self.current_window_start();
        Arc::clone(
            self.ledgers
                .entry(provider_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(LedgerEntry::new(provider_id, window_start))))
                .value(),
        )
    }

    fn current_window_start(&self) -> chrono::DateTime<chrono::Utc> {
        window_start_for(self.clock.now(), self.window_seconds)
    }

    fn rolled(&self, entry: &mut LedgerEntry) {
        let window_start = self.current_window_start();
        if entry.roll_over(window_start) {
            tracing::debug!(
                provider_id = %entry.provider_id,
                window_start = %window_start,
                "Budget window rolled over"
            );
        }
    }

    /// Whether an attempt costing `estimated` would be admitted right now.
    pub fn check(&self, provider_id: &str, estimated: f64) -> Admission {
        let limits = self.limits(provider_id);
        let ledger = self.ledger(provider_id);
        let mut entry = ledger.lock();
        self.rolled(&mut entry);
        entry.check(estimated, &limits)
    }

    pub fn admit(&self, provider_id: &str, estimated: f64) -> bool {
        self.check(provider_id, estimated).is_admitted()
    }

    /// Atomically check and reserve budget for one attempt.
    ///
    /// On success the attempt counts toward the rate limit immediately.
    pub fn try_reserve(&self, provider_id: &str, estimated: f64) -> Result<Reservation, Admission> {
        let limits = self.limits(provider_id);
        let ledger = self.ledger(provider_id);
        let mut entry = ledger.lock();
        self.rolled(&mut entry);

        match entry.check(estimated, &limits) {
            Admission::Admitted => {
                entry.reserved += estimated;
                entry.request_count += 1;
                Ok(Reservation {
                    provider_id: provider_id.to_string(),
                    window_start: entry.window_start,
                    estimated,
                })
            }
            refused => {
                tracing::debug!(
                    provider_id = %provider_id,
                    estimated,
                    reason = refused.as_str(),
                    "Budget refused attempt"
                );
                Err(refused)
            }
        }
    }

    /// Settle a reservation with the cost actually billed.
    ///
    /// Spend above the cap is recorded as overage, never as spend.
    pub fn commit(&self, reservation: &Reservation, actual: f64) {
        let limits = self.limits(&reservation.provider_id);
        let ledger = self.ledger(&reservation.provider_id);
        let mut entry = ledger.lock();
        self.rolled(&mut entry);

        if entry.window_start == reservation.window_start {
            entry.reserved = (entry.reserved - reservation.estimated).max(0.0);
        }
        let actual = if actual.is_finite() { actual.max(0.0) } else { reservation.estimated };
        let before = entry.overage;
        entry.book(actual, &limits);
        if entry.overage > before {
            tracing::warn!(
                provider_id = %reservation.provider_id,
                actual,
                estimated = reservation.estimated,
                overage = entry.overage,
                "Billed cost exceeded the spend cap"
            );
        }
    }

    /// Give back a reservation for an attempt that was not billed.
    ///
    /// The attempt still counts toward the rate limit.
    pub fn release(&self, reservation: &Reservation) {
        let ledger = self.ledger(&reservation.provider_id);
        let mut entry = ledger.lock();
        self.rolled(&mut entry);
        if entry.window_start == reservation.window_start {
            entry.reserved = (entry.reserved - reservation.estimated).max(0.0);
        }
    }

    /// Current ledger entry for the provider.
    pub fn snapshot(&self, provider_id: &str) -> LedgerEntry {
        let ledger = self.ledger(provider_id);
        let mut entry = ledger.lock();
        self.rolled(&mut entry);
        entry.clone()
    }

    /// Remaining spend in this window (None = uncapped).
    pub fn remaining(&self, provider_id: &str) -> Option<f64> {
        let limits = self.limits(provider_id);
        self.snapshot(provider_id).remaining(&limits)
    }
}
