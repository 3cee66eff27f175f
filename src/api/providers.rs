//! Provider listing endpoint handler.

use crate::api::AppState;
use crate::budget::LedgerEntry;
use crate::health::HealthSnapshot;
use crate::registry::ProviderDescriptor;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

/// One provider with its live state.
#[derive(Debug, Serialize)]
pub struct ProviderView {
    #[serde(flatten)]
    pub descriptor: ProviderDescriptor,
    pub health: HealthSnapshot,
    pub budget: BudgetView,
}

/// Current budget window for a provider.
#[derive(Debug, Serialize)]
pub struct BudgetView {
    #[serde(flatten)]
    pub ledger: LedgerEntry,
    /// Spend left in this window (absent when uncapped)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<f64>,
}

/// Provider listing response.
#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderView>,
}

/// GET /v1/providers - List providers with health and budget state.
pub async fn handle(State(state): State<Arc<AppState>>) -> Json<ProvidersResponse> {
    let dispatcher = &state.dispatcher;
    let providers = dispatcher
        .registry()
        .descriptors()
        .into_iter()
        .map(|descriptor| ProviderView {
            health: dispatcher.health().snapshot(&descriptor.id),
            budget: BudgetView {
                ledger: dispatcher.budget().snapshot(&descriptor.id),
                remaining: dispatcher.budget().remaining(&descriptor.id),
            },
            descriptor: descriptor.clone(),
        })
        .collect();

    Json(ProvidersResponse { providers })
}
