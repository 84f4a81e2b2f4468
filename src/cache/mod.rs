//! Short-lived compliment caching with TTL and LRU eviction.

pub mod response_cache;

pub use response_cache::{CacheEntry, CacheStats, ResponseCache};
