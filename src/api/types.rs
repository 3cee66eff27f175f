//! Request and response bodies for the capability endpoint.

use crate::dispatch::{AttemptRecord, SubmitResponse};
use crate::request::{CapabilityRequest, Constraints, Payload};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Payload as it appears on the wire.
///
/// Exactly one of `text`, `base64` or `json` carries the content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
}

impl PayloadBody {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn json(value: Value) -> Self {
        Self {
            json: Some(value),
            ..Default::default()
        }
    }

    pub fn into_payload(self) -> Result<Payload, String> {
        let content_type = self.content_type;
        match (self.text, self.base64, self.json) {
            (Some(text), None, None) => Ok(Payload::new(
                content_type.unwrap_or_else(|| "text/plain".to_string()),
                text.into_bytes(),
            )),
            (None, Some(encoded), None) => {
                let data = BASE64
                    .decode(encoded.as_bytes())
                    .map_err(|e| format!("payload.base64 is not valid base64: {}", e))?;
                Ok(Payload::new(
                    content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
                    data,
                ))
            }
            (None, None, Some(json)) => Ok(Payload::new(
                content_type.unwrap_or_else(|| "application/json".to_string()),
                json.to_string().into_bytes(),
            )),
            (None, None, None) => {
                Err("payload must carry one of 'text', 'base64' or 'json'".to_string())
            }
            _ => Err("payload must carry only one of 'text', 'base64' or 'json'".to_string()),
        }
    }

    /// Wire form of a result: JSON when it parses, text when it is
    /// textual UTF-8, base64 otherwise.
    pub fn from_payload(payload: &Payload) -> Self {
        let content_type = Some(payload.content_type.clone());
        if let Some(json) = payload.as_json() {
            return Self {
                content_type,
                json: Some(json),
                ..Default::default()
            };
        }
        if payload.is_textual() {
            if let Some(text) = payload.as_text() {
                return Self {
                    content_type,
                    text: Some(text.to_string()),
                    ..Default::default()
                };
            }
        }
        Self {
            content_type,
            base64: Some(BASE64.encode(&payload.data)),
            ..Default::default()
        }
    }
}

/// Constraints as they appear on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintsBody {
    pub max_cost: Option<f64>,
    pub max_latency_ms: Option<u64>,
    pub required_language: Option<String>,
    pub idempotency_key: Option<String>,
    pub deadline_ms: Option<u64>,
}

impl ConstraintsBody {
    pub fn into_constraints(self) -> Result<Constraints, String> {
        if self.deadline_ms == Some(0) {
            return Err("deadline_ms must be greater than zero".to_string());
        }
        Ok(Constraints {
            max_cost: self.max_cost,
            max_latency: self.max_latency_ms.map(Duration::from_millis),
            required_language: self.required_language,
            idempotency_key: self.idempotency_key,
            deadline: self.deadline_ms.map(Duration::from_millis),
        })
    }
}

/// `POST /v1/capability/:name` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityRequestBody {
    pub payload: PayloadBody,
    #[serde(default)]
    pub constraints: ConstraintsBody,
}

impl CapabilityRequestBody {
    pub fn into_request(self, capability: &str) -> Result<CapabilityRequest, String> {
        Ok(CapabilityRequest::new(capability, self.payload.into_payload()?)
            .with_constraints(self.constraints.into_constraints()?))
    }
}

/// `POST /v1/capability/:name` success body.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityResponseBody {
    pub result: PayloadBody,
    pub provider_used: String,
    pub cached: bool,
    pub coalesced: bool,
    pub cost: f64,
    pub attempts: Vec<AttemptRecord>,
}

impl From<SubmitResponse> for CapabilityResponseBody {
    fn from(response: SubmitResponse) -> Self {
        Self {
            result: PayloadBody::from_payload(&response.result),
            provider_used: response.provider_used,
            cached: response.cached,
            coalesced: response.coalesced,
            cost: response.cost,
            attempts: response.attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_payload_defaults_content_type() {
        let body: PayloadBody = serde_json::from_value(json!({"text": "hello"})).unwrap();
        let payload = body.into_payload().unwrap();
        assert_eq!(payload.content_type, "text/plain");
        assert_eq!(payload.as_text(), Some("hello"));
    }

    #[test]
    fn test_base64_payload_decoded() {
        let body: PayloadBody = serde_json::from_value(json!({
            "content_type": "audio/wav",
            "base64": "UklGRg=="
        }))
        .unwrap();
        let payload = body.into_payload().unwrap();
        assert_eq!(payload.content_type, "audio/wav");
        assert_eq!(payload.data, b"RIFF");
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let body = PayloadBody {
            base64: Some("not base64!!".into()),
            ..Default::default()
        };
        assert!(body.into_payload().unwrap_err().contains("base64"));
    }

    #[test]
    fn test_payload_requires_exactly_one_form() {
        assert!(PayloadBody::default().into_payload().is_err());
        let both = PayloadBody {
            text: Some("a".into()),
            json: Some(json!(1)),
            ..Default::default()
        };
        assert!(both.into_payload().unwrap_err().contains("only one"));
    }

    #[test]
    fn test_result_forms() {
        let json_result = PayloadBody::from_payload(&Payload::json(&json!({"label": "billing"})));
        assert_eq!(json_result.json, Some(json!({"label": "billing"})));

        let text_result = PayloadBody::from_payload(&Payload::text("transcript"));
        assert_eq!(text_result.text.as_deref(), Some("transcript"));

        let binary = PayloadBody::from_payload(&Payload::new("image/png", vec![1u8, 2, 3]));
        assert_eq!(binary.base64.as_deref(), Some("AQID"));
    }

    #[test]
    fn test_request_body_full() {
        let body: CapabilityRequestBody = serde_json::from_value(json!({
            "payload": {"text": "refund please"},
            "constraints": {
                "max_cost": 2.0,
                "max_latency_ms": 800,
                "required_language": "en",
                "idempotency_key": "abc",
                "deadline_ms": 5000
            }
        }))
        .unwrap();
        let request = body.into_request("text_classification").unwrap();
        assert_eq!(request.capability, "text_classification");
        assert_eq!(request.constraints.max_cost, Some(2.0));
        assert_eq!(request.constraints.max_latency, Some(Duration::from_millis(800)));
        assert_eq!(request.constraints.deadline, Some(Duration::from_secs(5)));
        assert_eq!(request.constraints.idempotency_key.as_deref(), Some("abc"));
    }

    #[test]
    fn test_zero_deadline_rejected() {
        let body = ConstraintsBody {
            deadline_ms: Some(0),
            ..Default::default()
        };
        assert!(body.into_constraints().is_err());
    }
}
