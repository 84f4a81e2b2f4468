//! Memoizing relay in front of the text-generation backend.
//!
//! A compliment for a name is generated at most once per cache TTL. Cache
//! misses make exactly one upstream call; failures are returned to the
//! caller and nothing is cached. Concurrent misses for the same name are
//! not coalesced: each makes its own call and the last one stored wins.

pub mod prompt;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cache::{CacheStats, ResponseCache};
use crate::error::Result;
use crate::providers::TextGenerator;

/// Serves compliments from cache, generating them on a miss.
pub struct ComplimentRelay {
    generator: Arc<dyn TextGenerator>,
    cache: Mutex<ResponseCache>,
}

impl ComplimentRelay {
    pub fn new(generator: Arc<dyn TextGenerator>, cache: ResponseCache) -> Self {
        Self {
            generator,
            cache: Mutex::new(cache),
        }
    }

    /// Compliment for an already validated name.
    pub async fn compliment(&self, key: &str) -> Result<String> {
        let cached = self.cache.lock().await.get(key);
        if let Some(compliment) = cached {
            debug!(name = key, "Compliment cache hit");
            return Ok(compliment);
        }

        // The cache lock is released here: the upstream call must not block
        // requests for other names.
        let generated = self.generator.generate(&prompt::instruction(key)).await?;
        if generated.is_none() {
            debug!(name = key, "No usable text in response, using fallback");
        }
        let compliment = prompt::finalize(generated, key);

        self.cache
            .lock()
            .await
            .put(key.to_string(), compliment.clone());
        info!(name = key, compliment = %compliment, "Generated compliment");

        Ok(compliment)
    }

    /// Whether a live cached compliment exists for `key`.
    pub async fn is_cached(&self, key: &str) -> bool {
        self.cache.lock().await.contains(key)
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.lock().await.stats()
    }

    /// Sweep expired cache entries. Returns how many were removed.
    pub async fn evict_expired(&self) -> usize {
        self.cache.lock().await.evict_expired()
    }
}
