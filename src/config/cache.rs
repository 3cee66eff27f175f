//! Result cache configuration

use serde::{Deserialize, Serialize};

/// In-process result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Maximum number of entries across all shards
    pub capacity: usize,
    /// TTL for capabilities that do not set their own
    pub default_ttl_seconds: u64,
    /// Number of independently locked shards
    pub shards: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 10_000,
            default_ttl_seconds: 600,
            shards: 16,
        }
    }
}
