//! Capability listing endpoint handler.

use crate::api::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct CapabilityView {
    pub name: String,
    pub cacheable: bool,
    pub cache_ttl_seconds: u64,
    /// Serving providers, in registry order
    pub providers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CapabilitiesResponse {
    pub capabilities: Vec<CapabilityView>,
}

/// GET /v1/capabilities - List declared capabilities.
pub async fn handle(State(state): State<Arc<AppState>>) -> Json<CapabilitiesResponse> {
    let registry = state.dispatcher.registry();
    let capabilities = registry
        .capabilities()
        .into_iter()
        .map(|definition| CapabilityView {
            name: definition.name.clone(),
            cacheable: definition.cacheable,
            cache_ttl_seconds: if definition.cacheable {
                definition.cache_ttl_seconds
            } else {
                0
            },
            providers: registry.provider_ids_for(&definition.name),
        })
        .collect();

    Json(CapabilitiesResponse { capabilities })
}
