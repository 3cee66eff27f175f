//! Cache key derivation.

use crate::request::CapabilityRequest;
use sha2::{Digest, Sha256};
use std::fmt;

/// Key identifying one memoizable capability call.
///
/// Built from the capability, a SHA-256 of the normalized payload and the
/// constraints that change the result (`required_language`). Cost and latency
/// limits only affect which provider answers, so they are not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_request(request: &CapabilityRequest) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(request.payload.essence().as_bytes());
        hasher.update([0u8]);
        hasher.update(&request.payload.data);
        let digest = hex::encode(hasher.finalize());

        let language = request
            .constraints
            .required_language
            .as_deref()
            .map(|l| l.trim().to_ascii_lowercase())
            .unwrap_or_default();

        Self(format!("{}:{}:{}", request.capability, digest, language))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Constraints, Payload};

    fn request(text: &str) -> CapabilityRequest {
        CapabilityRequest::new("text_classification", Payload::text(text))
    }

    #[test]
    fn test_same_input_same_key() {
        assert_eq!(CacheKey::for_request(&request("a")), CacheKey::for_request(&request("a")));
        assert_ne!(CacheKey::for_request(&request("a")), CacheKey::for_request(&request("b")));
    }

    #[test]
    fn test_content_type_parameters_normalized() {
        let plain = request("hello");
        let with_charset = CapabilityRequest::new(
            "text_classification",
            Payload::new("Text/Plain; charset=utf-8", "hello"),
        );
        assert_eq!(CacheKey::for_request(&plain), CacheKey::for_request(&with_charset));
    }

    #[test]
    fn test_language_is_part_of_key() {
        let en = request("hello").with_constraints(Constraints::default().with_language("en"));
        let de = request("hello").with_constraints(Constraints::default().with_language("DE"));
        let de_lower = request("hello").with_constraints(Constraints::default().with_language("de"));

        assert_ne!(CacheKey::for_request(&en), CacheKey::for_request(&de));
        assert_eq!(CacheKey::for_request(&de), CacheKey::for_request(&de_lower));
    }

    #[test]
    fn test_cost_limit_is_not_part_of_key() {
        let cheap = request("hello").with_constraints(Constraints::default().with_max_cost(0.5));
        assert_eq!(CacheKey::for_request(&cheap), CacheKey::for_request(&request("hello")));
    }

    #[test]
    fn test_capability_is_part_of_key() {
        let other = CapabilityRequest::new("generate_recommendation", Payload::text("a"));
        assert_ne!(CacheKey::for_request(&request("a")), CacheKey::for_request(&other));
    }
}
