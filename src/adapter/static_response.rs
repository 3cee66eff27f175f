//! Static adapter implementation.

use super::{AdapterError, AdapterOutput, InvocationContext, ProviderAdapter};
use crate::config::ProviderConfig;
use crate::registry::CostModel;
use crate::request::Payload;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Adapter that answers every invocation with a fixed response.
///
/// Stands in for stubbed providers during local smoke runs:
/// - `options.response`: JSON value returned as `application/json` (default `{"status": "ok"}`)
/// - `options.latency_ms`: simulated provider latency (default 0)
pub struct StaticAdapter {
    id: String,
    response: Value,
    latency: Duration,
    cost_model: CostModel,
}

impl StaticAdapter {
    pub fn new(id: impl Into<String>, cost_model: CostModel) -> Self {
        Self {
            id: id.into(),
            response: json!({ "status": "ok" }),
            latency: Duration::ZERO,
            cost_model,
        }
    }

    pub fn with_response(mut self, response: Value) -> Self {
        self.response = response;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, AdapterError> {
        let mut adapter = Self::new(&config.id, config.cost);

        if let Some(response) = config.options.get("response") {
            adapter.response = response.clone();
        }
        if let Some(latency) = config.options.get("latency_ms") {
            let ms = latency.as_u64().ok_or_else(|| {
                AdapterError::Configuration(format!(
                    "options.latency_ms must be a non-negative integer, got {}",
                    latency
                ))
            })?;
            adapter.latency = Duration::from_millis(ms);
        }

        Ok(adapter)
    }
}

#[async_trait]
impl ProviderAdapter for StaticAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "static"
    }

    fn cost_model(&self) -> CostModel {
        self.cost_model
    }

    async fn invoke(
        &self,
        ctx: &InvocationContext,
        payload: &Payload,
    ) -> Result<AdapterOutput, AdapterError> {
        if !self.latency.is_zero() {
            tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(AdapterError::Cancelled),
                _ = tokio::time::sleep(self.latency) => {}
            }
        }

        Ok(AdapterOutput::new(
            Payload::json(&self.response),
            self.estimate_cost(payload),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn ctx() -> InvocationContext {
        InvocationContext::new("text_classification", Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_static_returns_configured_response() {
        let adapter = StaticAdapter::new("s1", CostModel::PerCall { price: 2.0 })
            .with_response(json!({ "label": "positive" }));

        let output = adapter.invoke(&ctx(), &Payload::text("great")).await.unwrap();
        assert_eq!(output.result.as_json().unwrap()["label"], "positive");
        assert_eq!(output.cost, 2.0);
    }

    #[tokio::test]
    async fn test_static_honours_cancellation() {
        let adapter = StaticAdapter::new("s1", CostModel::default())
            .with_latency(Duration::from_secs(30));
        let ctx = ctx();
        ctx.cancel.cancel();

        let result = adapter.invoke(&ctx, &Payload::text("x")).await;
        assert_eq!(result, Err(AdapterError::Cancelled));
    }

    #[test]
    fn test_static_from_config_options() {
        let mut options = HashMap::new();
        options.insert("response".to_string(), json!(["a", "b"]));
        options.insert("latency_ms".to_string(), json!(25));
        let config = ProviderConfig {
            id: "s1".to_string(),
            adapter: "static".to_string(),
            url: String::new(),
            capabilities: vec!["generate_recommendation".to_string()],
            cost: CostModel::default(),
            latency_ms: 25,
            languages: vec![],
            priority: 50,
            timeout_ms: None,
            api_key_env: None,
            spend_cap: None,
            max_requests_per_window: None,
            options,
        };

        let adapter = StaticAdapter::from_config(&config).unwrap();
        assert_eq!(adapter.latency, Duration::from_millis(25));
        assert_eq!(adapter.response, json!(["a", "b"]));
    }

    #[test]
    fn test_static_rejects_bad_latency() {
        let config: ProviderConfig = toml::from_str(
            r#"
            id = "s1"
            adapter = "static"
            capabilities = ["x"]
            [options]
            latency_ms = "slow"
            "#,
        )
        .unwrap();

        assert!(matches!(
            StaticAdapter::from_config(&config),
            Err(AdapterError::Configuration(_))
        ));
    }
}
