//! Health check endpoint handler.

use crate::api::AppState;
use crate::health::CircuitState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub providers: CircuitCounts,
    pub capabilities: usize,
}

/// Providers per circuit state.
#[derive(Debug, Serialize, Deserialize)]
pub struct CircuitCounts {
    pub total: usize,
    pub closed: usize,
    pub half_open: usize,
    pub open: usize,
}

/// GET /health - Return service status.
pub async fn handle(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let registry = state.dispatcher.registry();
    let health = state.dispatcher.health();

    let mut counts = CircuitCounts {
        total: 0,
        closed: 0,
        half_open: 0,
        open: 0,
    };
    for descriptor in registry.descriptors() {
        counts.total += 1;
        match health.circuit_state(&descriptor.id) {
            CircuitState::Closed => counts.closed += 1,
            CircuitState::HalfOpen => counts.half_open += 1,
            CircuitState::Open => counts.open += 1,
        }
    }

    let status = match (counts.closed, counts.total) {
        (c, t) if c == t && t > 0 => "healthy",
        (c, _) if c > 0 || counts.half_open > 0 => "degraded",
        _ => "unhealthy",
    };

    Json(HealthResponse {
        status: status.to_string(),
        uptime_seconds: state.metrics_collector.uptime_seconds(),
        providers: counts,
        capabilities: registry.capability_count(),
    })
}
