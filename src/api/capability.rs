//! Capability invocation endpoint handler.

use crate::api::{ApiError, AppState, CapabilityRequestBody, CapabilityResponseBody};
use crate::dispatch::SubmitContext;
use crate::logging::{extract_status, RequestId};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Header naming the provider that produced the result
pub const PROVIDER_HEADER: &str = "x-conduit-provider";

/// POST /v1/capability/:name - Invoke a capability.
pub async fn handle(
    State(state): State<Arc<AppState>>,
    Path(capability): Path<String>,
    request_id: Option<Extension<RequestId>>,
    body: Result<Json<CapabilityRequestBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let start_time = std::time::Instant::now();
    let request_id = request_id.map(|Extension(RequestId(id))| id);

    let Json(body) = body.map_err(|rejection| match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            rejection.body_text(),
        ),
        _ => ApiError::bad_request(rejection.body_text()),
    })?;
    let request = body
        .into_request(&capability)
        .map_err(ApiError::bad_request)?;

    // The dispatch runs on its own task so a dropped connection cancels it
    // cleanly instead of abandoning a reservation mid-attempt
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let mut context = SubmitContext::new(cancel);
    context.request_id = request_id.clone();

    let dispatcher = state.dispatcher.clone();
    let result = tokio::spawn(async move { dispatcher.submit_with_context(request, context).await })
        .await
        .map_err(|e| ApiError::internal(format!("dispatch task failed: {}", e)))?;

    let (status, error_message) = extract_status(&result);
    info!(
        capability = %capability,
        request_id = request_id.as_deref().unwrap_or("-"),
        status = %status,
        provider = result.as_ref().map(|r| r.provider_used.as_str()).unwrap_or("-"),
        attempts = result.as_ref().map(|r| r.attempts.len()).unwrap_or_else(|e| e.attempts().len()),
        duration_ms = start_time.elapsed().as_millis() as u64,
        error_message = error_message.as_deref(),
        "Capability request"
    );

    let response = result?;
    let provider = HeaderValue::from_str(&response.provider_used).ok();
    let mut http_response = Json(CapabilityResponseBody::from(response)).into_response();
    if let Some(provider) = provider {
        http_response.headers_mut().insert(PROVIDER_HEADER, provider);
    }
    Ok(http_response)
}
