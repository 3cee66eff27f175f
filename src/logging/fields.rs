//! Field extraction helpers for structured logging

use crate::dispatch::{DispatchError, SubmitResponse};
use crate::request::Payload;

/// Extract status and error message from a dispatch result
///
/// Returns a tuple of (status, error_message).
/// - For Ok results: ("success", None)
/// - For Err results: (error code, Some(error_message))
pub fn extract_status(result: &Result<SubmitResponse, DispatchError>) -> (String, Option<String>) {
    match result {
        Ok(_) => ("success".to_string(), None),
        Err(e) => (e.code().to_string(), Some(e.to_string())),
    }
}

/// Short human-readable preview of a payload for debug logs.
///
/// Textual payloads are truncated to `max_chars` characters; binary
/// payloads are summarized by type and size only.
///
/// # Examples
///
/// ```
/// use conduit::logging::payload_preview;
/// use conduit::request::Payload;
///
/// assert_eq!(payload_preview(&Payload::text("hello world"), 5), "hello...");
/// assert_eq!(
///     payload_preview(&Payload::new("audio/wav", vec![0u8; 2048]), 5),
///     "<audio/wav, 2048 bytes>"
/// );
/// ```
pub fn payload_preview(payload: &Payload, max_chars: usize) -> String {
    match payload.as_text().filter(|_| payload.is_textual()) {
        Some(text) => truncate_chars(text, max_chars),
        None => format!("<{}, {} bytes>", payload.essence(), payload.len()),
    }
}

/// Truncate on a character boundary, appending `...` when shortened.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}
