//! Compliment cache with TTL expiry and LRU eviction.
//!
//! Keyed by the validated name. Entries live for a fixed TTL from the moment
//! they are stored; a hit does not extend it. Memory only, nothing survives
//! a restart.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::config::CacheConfig;

/// A single cached compliment.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The compliment text.
    pub response: String,
    pub created_at: Instant,
    pub accessed_at: Instant,
    /// Number of cache hits for this entry.
    pub hit_count: u32,
}

/// In-memory response cache.
#[derive(Debug)]
pub struct ResponseCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
    max_entries: usize,
}

impl ResponseCache {
    /// Create an empty cache. `max_entries` is clamped to at least 1.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl, config.max_entries)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a cached response. Returns `None` if the key is absent or expired.
    ///
    /// An expired entry is removed on the spot.
    pub fn get(&mut self, key: &str) -> Option<String> {
        let now = Instant::now();
        let expired = self.entries.get(key).map(|e| self.is_expired(e, now))?;
        if expired {
            debug!(key, "Cache entry expired, removing");
            self.entries.remove(key);
            return None;
        }
        let entry = self.entries.get_mut(key)?;
        entry.accessed_at = now;
        entry.hit_count = entry.hit_count.saturating_add(1);
        Some(entry.response.clone())
    }

    /// Whether a live entry exists for `key`, without touching its stats.
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .is_some_and(|e| !self.is_expired(e, now))
    }

    /// Store a response, replacing any previous entry for the key.
    ///
    /// Evicts expired entries first, then LRU entries if at capacity.
    pub fn put(&mut self, key: String, response: String) {
        let now = Instant::now();
        self.entries.remove(&key);
        self.evict_expired_at(now);
        while self.entries.len() >= self.max_entries {
            self.evict_lru();
        }
        self.entries.insert(
            key,
            CacheEntry {
                response,
                created_at: now,
                accessed_at: now,
                hit_count: 0,
            },
        );
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn evict_expired(&mut self) -> usize {
        self.evict_expired_at(Instant::now())
    }

    /// Return aggregate statistics about the cache.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.entries.len(),
            total_hits: self
                .entries
                .values()
                .map(|e| u64::from(e.hit_count))
                .sum(),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // -- private helpers ---------------------------------------------------

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.created_at) >= self.ttl
    }

    fn evict_expired_at(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.created_at) < ttl);
        before - self.entries.len()
    }

    fn evict_lru(&mut self) {
        if let Some(lru_key) = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.accessed_at)
            .map(|(k, _)| k.clone())
        {
            debug!(key = %lru_key, "Evicting LRU cache entry");
            self.entries.remove(&lru_key);
        }
    }
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries currently in the cache (expired ones included until swept).
    pub total_entries: usize,
    /// Cumulative hits across live entries.
    pub total_hits: u64,
}
