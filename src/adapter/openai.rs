//! OpenAI-compatible adapter implementation.

use super::factory::resolve_api_key;
use super::{AdapterError, AdapterOutput, InvocationContext, ProviderAdapter};
use crate::config::ProviderConfig;
use crate::registry::CostModel;
use crate::request::Payload;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Capability routed to the audio transcription endpoint.
pub const SPEECH_TO_TEXT: &str = "speech_to_text";

/// OpenAI adapter implementation.
///
/// - `speech_to_text` via multipart POST /v1/audio/transcriptions
/// - every other capability via POST /v1/chat/completions, with the system
///   instruction taken from `options.instructions.<capability>`
///
/// Cost comes from reported token usage when `options.price_per_1k_tokens`
/// is set, otherwise from the provider's cost model.
pub struct OpenAIAdapter {
    id: String,
    base_url: String,
    api_key: Option<String>,
    chat_model: String,
    transcription_model: String,
    instructions: HashMap<String, String>,
    price_per_1k_tokens: Option<f64>,
    cost_model: CostModel,
    client: Arc<Client>,
}

/// /v1/chat/completions response format
#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u64,
}

/// /v1/audio/transcriptions response format
#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl OpenAIAdapter {
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
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            instructions: HashMap::new(),
            price_per_1k_tokens: None,
            cost_model,
            client,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_instruction(
        mut self,
        capability: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        self.instructions
            .insert(capability.into(), instruction.into());
        self
    }

    pub fn with_token_price(mut self, price_per_1k_tokens: f64) -> Self {
        self.price_per_1k_tokens = Some(price_per_1k_tokens);
        self
    }

    pub fn from_config(config: &ProviderConfig, client: Arc<Client>) -> Result<Self, AdapterError> {
        let base_url = if config.url.trim().is_empty() {
            DEFAULT_BASE_URL
        } else {
            config.url.as_str()
        };
        let mut adapter = Self::new(&config.id, base_url, config.cost, client);
        adapter.api_key = resolve_api_key(config)?;

        if let Some(model) = option_str(config, "model")? {
            adapter.chat_model = model;
        }
        if let Some(model) = option_str(config, "transcription_model")? {
            adapter.transcription_model = model;
        }
        if let Some(price) = config.options.get("price_per_1k_tokens") {
            let price = price
                .as_f64()
                .filter(|p| p.is_finite() && *p >= 0.0)
                .ok_or_else(|| {
                    AdapterError::Configuration(
                        "options.price_per_1k_tokens must be a number >= 0".to_string(),
                    )
                })?;
            adapter.price_per_1k_tokens = Some(price);
        }
        if let Some(instructions) = config.options.get("instructions") {
            let map = instructions.as_object().ok_or_else(|| {
                AdapterError::Configuration(
                    "options.instructions must map capability names to text".to_string(),
                )
            })?;
            for (capability, text) in map {
                let text = text.as_str().ok_or_else(|| {
                    AdapterError::Configuration(format!(
                        "options.instructions.{} must be a string",
                        capability
                    ))
                })?;
                adapter
                    .instructions
                    .insert(capability.clone(), text.to_string());
            }
        }

        Ok(adapter)
    }

    fn instruction_for(&self, ctx: &InvocationContext) -> String {
        let mut instruction = self
            .instructions
            .get(&ctx.capability)
            .cloned()
            .unwrap_or_else(|| {
                format!(
                    "Perform the '{}' task on the user input and reply with the result only.",
                    ctx.capability
                )
            });
        if let Some(language) = &ctx.required_language {
            instruction.push_str(&format!(" Respond in language '{}'.", language));
        }
        instruction
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn transcribe(
        &self,
        ctx: &InvocationContext,
        payload: &Payload,
    ) -> Result<AdapterOutput, AdapterError> {
        let file = Part::bytes(payload.data.clone())
            .file_name(audio_file_name(&payload.essence()))
            .mime_str(&payload.essence())
            .map_err(|e| AdapterError::InvalidInput(format!("Invalid audio content type: {}", e)))?;

        let mut form = Form::new()
            .part("file", file)
            .text("model", self.transcription_model.clone());
        if let Some(language) = &ctx.required_language {
            form = form.text("language", language.clone());
        }

        let url = format!("{}/v1/audio/transcriptions", self.base_url);
        let response = self
            .authorize(self.client.post(&url))
            .multipart(form)
            .timeout(ctx.timeout)
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(e, ctx.timeout_ms()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::from_status(status, &body));
        }

        let transcription: TranscriptionResponse = response.json().await.map_err(|e| {
            AdapterError::InvalidResponse(format!("Failed to parse transcription response: {}", e))
        })?;

        Ok(AdapterOutput::new(
            Payload::json(&json!({ "text": transcription.text })),
            self.estimate_cost(payload),
        ))
    }

    async fn complete(
        &self,
        ctx: &InvocationContext,
        payload: &Payload,
    ) -> Result<AdapterOutput, AdapterError> {
        let input = match payload.as_text() {
            Some(text) if payload.is_textual() => text,
            _ => {
                return Err(AdapterError::InvalidInput(format!(
                    "'{}' requires a textual payload, got {}",
                    ctx.capability, payload.content_type
                )))
            }
        };

        let body = json!({
            "model": self.chat_model,
            "messages": [
                { "role": "system", "content": self.instruction_for(ctx) },
                { "role": "user", "content": input },
            ],
        });

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .timeout(ctx.timeout)
            .send()
            .await
            .map_err(|e| AdapterError::from_reqwest(e, ctx.timeout_ms()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::from_status(status, &body));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            AdapterError::InvalidResponse(format!("Failed to parse chat completion: {}", e))
        })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AdapterError::InvalidResponse("Response has no content".to_string()))?;

        let cost = match (self.price_per_1k_tokens, completion.usage) {
            (Some(price), Some(usage)) => price * usage.total_tokens as f64 / 1000.0,
            _ => self.estimate_cost(payload),
        };

        // Structured answers stay structured
        let result = match serde_json::from_str::<serde_json::Value>(content.trim()) {
            Ok(value) if value.is_object() || value.is_array() => Payload::json(&value),
            _ => Payload::text(content),
        };

        Ok(AdapterOutput::new(result, cost))
    }
}

fn option_str(config: &ProviderConfig, key: &str) -> Result<Option<String>, AdapterError> {
    match config.options.get(key) {
        Some(value) => value
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| AdapterError::Configuration(format!("options.{} must be a string", key))),
        None => Ok(None),
    }
}

fn audio_file_name(media_type: &str) -> String {
    let extension = match media_type {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        "audio/ogg" => "ogg",
        "audio/webm" => "webm",
        "audio/flac" | "audio/x-flac" => "flac",
        _ => "wav",
    };
    format!("audio.{}", extension)
}

#[async_trait]
impl ProviderAdapter for OpenAIAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "openai"
    }

    fn cost_model(&self) -> CostModel {
        self.cost_model
    }

    async fn invoke(
        &self,
        ctx: &InvocationContext,
        payload: &Payload,
    ) -> Result<AdapterOutput, AdapterError> {
        let call = async {
            if ctx.capability == SPEECH_TO_TEXT {
                self.transcribe(ctx, payload).await
            } else {
                self.complete(ctx, payload).await
            }
        };

        tokio::select! {
            _ = ctx.cancel.cancelled() => Err(AdapterError::Cancelled),
            result = call => result,
        }
    }
}
