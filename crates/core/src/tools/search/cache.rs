//! Process-wide search result cache keyed by `(query, count)`.

use super::SearchResult;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cache key for a search call
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CacheKey {
    pub query: String,
    pub count: u32,
}

impl CacheKey {
    pub fn new(query: &str, count: u32) -> Self {
        Self {
            query: query.to_string(),
            count,
        }
    }
}

/// Bounded LRU cache of provider responses, shared across sessions
#[derive(Debug)]
pub struct SearchCache {
    cache: Cache<CacheKey, Arc<Vec<SearchResult>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SearchCache {
    /// Create a cache holding at most `max_capacity` entries for `ttl`
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Self {
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Arc<Vec<SearchResult>>> {
        let result = self.cache.get(key).await;
        if result.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    pub async fn insert(&self, key: CacheKey, results: Vec<SearchResult>) {
        self.cache.insert(key, Arc::new(results)).await;
    }

    /// Drop every entry
    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            entry_count: self.cache.entry_count(),
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

impl Default for SearchCache {
    /// 100 entries, one hour
    fn default() -> Self {
        Self::new(100, Duration::from_secs(3600))
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub entry_count: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}
