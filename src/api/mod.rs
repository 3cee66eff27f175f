//! # HTTP API
//!
//! JSON endpoints in front of the dispatcher.
//!
//! ## Endpoints
//!
//! - `POST /v1/capability/:name` - Invoke a capability
//! - `GET /v1/providers` - Provider descriptors with health and budget state
//! - `GET /v1/capabilities` - Declared capabilities and their providers
//! - `GET /health` - Service status with circuit counts
//! - `GET /metrics` - Prometheus metrics
//!
//! ## Example
//!
//! ```no_run
//! use conduit::adapter::AdapterFactory;
//! use conduit::api::{create_router, AppState};
//! use conduit::clock::system_clock;
//! use conduit::config::ConduitConfig;
//! use conduit::dispatch::Dispatcher;
//! use conduit::registry::Registry;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(ConduitConfig::load(Some("conduit.toml".as_ref()))?);
//! let registry = Arc::new(Registry::from_config(&config, &AdapterFactory::default())?);
//! let dispatcher = Dispatcher::from_config(&config, registry, system_clock());
//!
//! let state = Arc::new(AppState::new(dispatcher, config));
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8700").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Errors share one envelope:
//! ```json
//! {
//!   "error": {
//!     "code": "all_providers_exhausted",
//!     "message": "All providers exhausted for capability 'speech_to_text'",
//!     "provider_failures": [{"provider_id": "whisper", "reason": "timed out after 5000ms"}]
//!   }
//! }
//! ```

mod capabilities;
mod capability;
pub mod error;
mod health;
mod providers;
pub mod types;

pub use capability::PROVIDER_HEADER;
pub use error::{ApiError, ApiErrorBody};
pub use health::HealthResponse;
pub use types::*;

use crate::config::ConduitConfig;
use crate::dispatch::Dispatcher;
use crate::metrics::MetricsCollector;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub config: Arc<ConduitConfig>,
    /// Server startup time for uptime tracking
    pub start_time: Instant,
    /// Metrics collector for observability
    pub metrics_collector: Arc<MetricsCollector>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, config: Arc<ConduitConfig>) -> Self {
        let start_time = Instant::now();

        // Safe to call more than once: a second install fails and we fall back
        // to a detached recorder handle
        let prometheus_handle = crate::metrics::setup_metrics().unwrap_or_else(|e| {
            tracing::debug!("Metrics already initialized, creating new handle: {}", e);
            crate::metrics::PrometheusBuilder::new()
                .build_recorder()
                .handle()
        });

        let metrics_collector = Arc::new(MetricsCollector::new(
            Arc::clone(dispatcher.registry()),
            Arc::clone(dispatcher.health()),
            start_time,
            prometheus_handle,
        ));

        Self {
            dispatcher,
            config,
            start_time,
            metrics_collector,
        }
    }
}

/// Create the main API router with all endpoints configured.
///
/// Request bodies are capped at `server.max_body_bytes`.
pub fn create_router(state: Arc<AppState>) -> Router {
    let max_body_bytes = state.config.server.max_body_bytes;
    Router::new()
        .route("/v1/capability/:name", post(capability::handle))
        .route("/v1/providers", get(providers::handle))
        .route("/v1/capabilities", get(capabilities::handle))
        .route("/health", get(health::handle))
        .route("/metrics", get(crate::metrics::handler::metrics_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            crate::logging::request_id_middleware,
        ))
        .with_state(state)
}
