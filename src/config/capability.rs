//! Capability definitions

use serde::{Deserialize, Serialize};

/// An abstract operation providers can serve.
///
/// Only capabilities declared `cacheable` ever have results memoized;
/// side-effecting operations (notifications, writes) must leave it off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityConfig {
    pub name: String,
    #[serde(default)]
    pub cacheable: bool,
    /// Overrides `cache.default_ttl_seconds` for this capability
    #[serde(default)]
    pub cache_ttl_seconds: Option<u64>,
}
