//! Shared test utilities for Conduit integration tests.
//!
//! Provides a scriptable mock adapter plus helpers that assemble a
//! registry, dispatcher and router from a TOML snippet.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use conduit::adapter::{AdapterError, AdapterOutput, InvocationContext, ProviderAdapter};
use conduit::api::{create_router, AppState};
use conduit::clock::{ManualClock, SharedClock};
use conduit::config::ConduitConfig;
use conduit::dispatch::Dispatcher;
use conduit::registry::{CostModel, ProviderDescriptor, Registry};
use conduit::request::Payload;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Mock Adapter
// =============================================================================

/// What a mock provider does on one invocation.
#[derive(Debug, Clone)]
pub enum Step {
    /// Return this text as `text/plain`
    Reply(String),
    /// Transient upstream failure (HTTP 503)
    Fail,
    /// Provider rejects the input
    Reject,
    /// Never answer; only the attempt timeout or cancellation ends it
    Hang,
}

/// Provider double driven by a queue of steps.
///
/// Once the queue is empty every call performs `fallback`.
pub struct MockAdapter {
    id: String,
    cost_model: CostModel,
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    delay: Duration,
    calls: AtomicUsize,
    languages_seen: Mutex<Vec<Option<String>>>,
}

impl MockAdapter {
    pub fn new(id: &str, cost_model: CostModel, fallback: Step) -> Self {
        Self {
            id: id.to_string(),
            cost_model,
            script: Mutex::new(VecDeque::new()),
            fallback,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            languages_seen: Mutex::new(Vec::new()),
        }
    }

    /// Replies with `"{id} ok"` forever.
    pub fn healthy(id: &str, price: f64) -> Self {
        Self::new(
            id,
            CostModel::PerCall { price },
            Step::Reply(format!("{} ok", id)),
        )
    }

    pub fn with_script(self, steps: impl IntoIterator<Item = Step>) -> Self {
        *self.script.lock() = steps.into_iter().collect();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn languages_seen(&self) -> Vec<Option<String>> {
        self.languages_seen.lock().clone()
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "mock"
    }

    fn cost_model(&self) -> CostModel {
        self.cost_model
    }

    async fn invoke(
        &self,
        ctx: &InvocationContext,
        payload: &Payload,
    ) -> Result<AdapterOutput, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.languages_seen
            .lock()
            .push(ctx.required_language.clone());
        let step = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        if !self.delay.is_zero() {
            tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(AdapterError::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        match step {
            Step::Reply(text) => Ok(AdapterOutput::new(
                Payload::text(text),
                self.estimate_cost(payload),
            )),
            Step::Fail => Err(AdapterError::Upstream {
                status: 503,
                message: "service unavailable".to_string(),
            }),
            Step::Reject => Err(AdapterError::InvalidInput("unsupported audio".to_string())),
            Step::Hang => {
                ctx.cancel.cancelled().await;
                Err(AdapterError::Cancelled)
            }
        }
    }
}

// =============================================================================
// Harness
// =============================================================================

/// A dispatcher wired to mock adapters, with handles for inspection.
pub struct Harness {
    pub config: ConduitConfig,
    pub dispatcher: Dispatcher,
    pub clock: Arc<ManualClock>,
    pub adapters: HashMap<String, Arc<MockAdapter>>,
}

impl Harness {
    pub fn adapter(&self, id: &str) -> &Arc<MockAdapter> {
        &self.adapters[id]
    }

    pub fn router(&self) -> axum::Router {
        let state = Arc::new(AppState::new(
            self.dispatcher.clone(),
            Arc::new(self.config.clone()),
        ));
        create_router(state)
    }
}

/// Build a harness from a TOML config. Every `[[providers]]` entry must have
/// a matching adapter in `adapters`; the `adapter` field in the TOML is
/// informational only.
pub fn harness(config_toml: &str, adapters: Vec<MockAdapter>) -> Harness {
    let config: ConduitConfig = toml::from_str(config_toml).expect("test config parses");
    config.validate().expect("test config validates");

    let clock = Arc::new(ManualClock::new());
    let shared: SharedClock = clock.clone();

    let adapters: HashMap<String, Arc<MockAdapter>> = adapters
        .into_iter()
        .map(|a| (a.id.clone(), Arc::new(a)))
        .collect();

    let mut registry = Registry::new();
    for capability in &config.capabilities {
        registry
            .declare_capability(conduit::registry::CapabilityDefinition::from_config(
                capability,
                config.cache.default_ttl_seconds,
            ))
            .unwrap();
    }
    for provider in &config.providers {
        let adapter = Arc::clone(
            adapters
                .get(&provider.id)
                .unwrap_or_else(|| panic!("no mock adapter for '{}'", provider.id)),
        );
        registry
            .register(ProviderDescriptor::from_config(provider), adapter)
            .unwrap();
    }
    registry.validate().unwrap();

    let dispatcher = Dispatcher::from_config(&config, Arc::new(registry), shared);

    Harness {
        config,
        dispatcher,
        clock,
        adapters,
    }
}

/// Two providers for `text_classification` with default scoring weights:
/// `cheap` (0.1/call, 300ms declared) and `premium` (1.0/call, 300ms declared).
pub const TWO_PROVIDERS: &str = r#"
[dispatch]
max_attempts = 3
default_attempt_timeout_ms = 200
request_deadline_ms = 2000

[[capabilities]]
name = "text_classification"

[[capabilities]]
name = "summarization"
cacheable = true
cache_ttl_seconds = 60

[[providers]]
id = "cheap"
adapter = "mock"
capabilities = ["text_classification", "summarization"]
cost = { model = "per_call", price = 0.1 }
latency_ms = 300
languages = ["en"]

[[providers]]
id = "premium"
adapter = "mock"
capabilities = ["text_classification", "summarization"]
cost = { model = "per_call", price = 1.0 }
latency_ms = 300
languages = ["en", "de"]
"#;

// =============================================================================
// HTTP Helpers
// =============================================================================

/// `POST /v1/capability/{name}` with a JSON body.
pub fn capability_request(name: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/v1/capability/{}", name))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
