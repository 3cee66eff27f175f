//! # Metrics HTTP Handler
//!
//! Axum handler for the Prometheus scrape endpoint.

use crate::api::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

/// Handler for GET /metrics endpoint (Prometheus text format).
///
/// Always returns 200 with the correct Content-Type for Prometheus scrapers,
/// even if no metrics have been recorded yet (returns empty text).
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // Refresh provider gauges before rendering
    state.metrics_collector.update_gauges();

    let metrics = state.metrics_collector.render_metrics();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        metrics,
    )
}
