//! In-process result cache.
//!
//! A size-bounded LRU split into independently locked shards. TTLs are
//! checked lazily on `get`; capacity is enforced on `put` by evicting the
//! least recently used entry of the affected shard. The cache is best-effort:
//! losing an entry only costs a provider call.

mod key;

pub use key::CacheKey;

use crate::clock::SharedClock;
use crate::config::CacheConfig;
use crate::request::Payload;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A memoized successful result.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResult {
    pub result: Payload,
    /// Provider that produced the result
    pub provider_id: String,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedResult,
    stored_at: DateTime<Utc>,
    ttl: chrono::Duration,
    last_used: u64,
}

#[derive(Debug, Default)]
struct Shard {
    entries: HashMap<CacheKey, CacheEntry>,
    tick: u64,
}

impl Shard {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn evict_lru(&mut self) -> Option<CacheKey> {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone())?;
        self.entries.remove(&victim);
        Some(victim)
    }
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Sharded LRU cache of capability results.
pub struct ResultCache {
    enabled: bool,
    shards: Vec<Mutex<Shard>>,
    shard_capacity: usize,
    clock: SharedClock,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResultCache {
    pub fn new(config: &CacheConfig, clock: SharedClock) -> Self {
        let shard_count = config.shards.max(1);
        let shard_capacity = config.capacity.div_ceil(shard_count).max(1);
        Self {
            enabled: config.enabled && config.capacity > 0,
            shards: (0..shard_count).map(|_| Mutex::new(Shard::default())).collect(),
            shard_capacity,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn shard(&self, key: &CacheKey) -> &Mutex<Shard> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[index]
    }

    /// Look up a live entry, dropping it if its TTL has passed.
    pub fn get(&self, key: &CacheKey) -> Option<CachedResult> {
        if !self.enabled {
            return None;
        }
        let now = self.clock.now();
        let mut shard = self.shard(key).lock();
        let tick = shard.next_tick();

        let expired = match shard.entries.get_mut(key) {
            Some(entry) if now - entry.stored_at < entry.ttl => {
                entry.last_used = tick;
                let value = entry.value.clone();
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            shard.entries.remove(key);
            tracing::trace!(key = %key, "Cache entry expired");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a result, evicting the least recently used entry if the shard is full.
    pub fn put(&self, key: CacheKey, value: CachedResult, ttl: Duration) {
        if !self.enabled || ttl.is_zero() {
            return;
        }
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let now = self.clock.now();
        let mut shard = self.shard(&key).lock();
        let tick = shard.next_tick();

        shard.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
                ttl,
                last_used: tick,
            },
        );

        while shard.entries.len() > self.shard_capacity {
            if let Some(evicted) = shard.evict_lru() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = %evicted, "Cache entry evicted");
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            shard.lock().entries.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::request::CapabilityRequest;
    use std::sync::Arc;

    fn cache(capacity: usize, shards: usize) -> (ResultCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let config = CacheConfig {
            enabled: true,
            capacity,
            default_ttl_seconds: 60,
            shards,
        };
        (ResultCache::new(&config, clock.clone()), clock)
    }

    fn key(text: &str) -> CacheKey {
        CacheKey::for_request(&CapabilityRequest::new(
            "text_classification",
            Payload::text(text),
        ))
    }

    fn value(label: &str) -> CachedResult {
        CachedResult {
            result: Payload::text(label),
            provider_id: "p1".to_string(),
        }
    }

    #[test]
    fn test_put_then_get() {
        let (cache, _) = cache(10, 2);
        cache.put(key("a"), value("positive"), Duration::from_secs(60));

        assert_eq!(cache.get(&key("a")), Some(value("positive")));
        assert_eq!(cache.get(&key("b")), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_ttl_checked_lazily() {
        let (cache, clock) = cache(10, 1);
        cache.put(key("a"), value("x"), Duration::from_secs(60));

        clock.advance(chrono::Duration::seconds(59));
        assert!(cache.get(&key("a")).is_some());

        clock.advance(chrono::Duration::seconds(1));
        assert!(cache.get(&key("a")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_eviction_on_put() {
        let (cache, _) = cache(2, 1);
        cache.put(key("a"), value("a"), Duration::from_secs(60));
        cache.put(key("b"), value("b"), Duration::from_secs(60));

        // Touch "a" so "b" becomes least recently used
        assert!(cache.get(&key("a")).is_some());
        cache.put(key("c"), value("c"), Duration::from_secs(60));

        assert!(cache.get(&key("a")).is_some());
        assert!(cache.get(&key("b")).is_none());
        assert!(cache.get(&key("c")).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_capacity_bound_across_shards() {
        let (cache, _) = cache(16, 4);
        for i in 0..200 {
            cache.put(key(&i.to_string()), value("v"), Duration::from_secs(60));
        }
        assert!(cache.len() <= 16);
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let clock = Arc::new(ManualClock::new());
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let cache = ResultCache::new(&config, clock);
        cache.put(key("a"), value("a"), Duration::from_secs(60));

        assert!(!cache.is_enabled());
        assert!(cache.get(&key("a")).is_none());
    }

    #[test]
    fn test_zero_ttl_not_stored() {
        let (cache, _) = cache(10, 1);
        cache.put(key("a"), value("a"), Duration::ZERO);
        assert!(cache.is_empty());
    }
}
