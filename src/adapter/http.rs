//! Generic HTTP adapter implementation.

use super::factory::resolve_api_key;
use super::{AdapterError, AdapterOutput, InvocationContext, ProviderAdapter};
use crate::config::ProviderConfig;
use crate::registry::CostModel;
use crate::request::Payload;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::sync::Arc;

/// Header a provider may set to report the cost it billed.
pub const COST_HEADER: &str = "x-cost";

/// Adapter for providers exposing the plain invoke protocol:
/// - `POST {url}/v1/invoke/{capability}` with the raw payload as body
/// - `content-type` carries the payload media type, `x-language` the required language
/// - optional Bearer token from `api_key_env`
/// - the reply body is the result; `x-cost` reports the billed cost
pub struct HttpAdapter {
    id: String,
    base_url: String,
    api_key: Option<String>,
    cost_model: CostModel,
    client: Arc<Client>,
}

impl HttpAdapter {
    pub fn new(
        id: impl Into<String>,
        base_url: impl Into<String>,
        cost_model: CostModel,
        client: Arc<Client>,
    ) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            cost_model,
            client,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn from_config(config: &ProviderConfig, client: Arc<Client>) -> Result<Self, AdapterError> {
        if config.url.trim().is_empty() {
            return Err(AdapterError::Configuration(
                "http adapter requires 'url'".to_string(),
            ));
        }
        let mut adapter = Self::new(&config.id, &config.url, config.cost, client);
        adapter.api_key = resolve_api_key(config)?;
        Ok(adapter)
    }

    fn invoke_url(&self, capability: &str) -> String {
        format!("{}/v1/invoke/{}", self.base_url, capability)
    }

    async fn send(
        &self,
        ctx: &InvocationContext,
        payload: &Payload,
    ) -> Result<AdapterOutput, AdapterError> {
        let mut request = self
            .client
            .post(self.invoke_url(&ctx.capability))
            .header(CONTENT_TYPE, &payload.content_type)
            .timeout(ctx.timeout)
            .body(payload.data.clone());

        if let Some(language) = &ctx.required_language {
            request = request.header("x-language", language);
        }
        if let Some(request_id) = &ctx.request_id {
            request = request.header("x-request-id", request_id);
        }
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(e, ctx.timeout_ms()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::from_status(status, &body));
        }

        let reported_cost = response
            .headers()
            .get(COST_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|c| c.is_finite() && *c >= 0.0);

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let body = response.bytes().await.map_err(|e| {
            AdapterError::InvalidResponse(format!("Failed to read response body: {}", e))
        })?;

        Ok(AdapterOutput::new(
            Payload::new(content_type, body.to_vec()),
            reported_cost.unwrap_or_else(|| self.estimate_cost(payload)),
        ))
    }
}

#[async_trait]
impl ProviderAdapter for HttpAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "http"
    }

    fn cost_model(&self) -> CostModel {
        self.cost_model
    }

    async fn invoke(
        &self,
        ctx: &InvocationContext,
        payload: &Payload,
    ) -> Result<AdapterOutput, AdapterError> {
        tokio::select! {
            _ = ctx.cancel.cancelled() => Err(AdapterError::Cancelled),
            result = self.send(ctx, payload) => result,
        }
    }
}
