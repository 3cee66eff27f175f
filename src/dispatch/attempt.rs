//! Attempt telemetry attached to every terminal response.

use crate::request::Payload;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// How one provider attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    /// The per-attempt timeout or the request deadline fired
    Timeout,
    /// Transient provider failure
    Failed,
    /// The provider rejected the caller's input
    Rejected,
    /// The caller cancelled while the attempt was in flight
    Cancelled,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Timeout => "timeout",
            AttemptOutcome::Failed => "failed",
            AttemptOutcome::Rejected => "rejected",
            AttemptOutcome::Cancelled => "cancelled",
        }
    }
}

/// One dispatched attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub provider_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Why a candidate did not produce a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderFailure {
    pub provider_id: String,
    pub reason: String,
}

/// Successful outcome of a submit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitResponse {
    pub result: Payload,
    pub provider_used: String,
    /// Ordered attempt log; empty when served from cache
    pub attempts: Vec<AttemptRecord>,
    pub cached: bool,
    /// True when this caller joined another request's call
    pub coalesced: bool,
    /// Cost billed for this request (0 for cache hits and joiners)
    pub cost: f64,
}
