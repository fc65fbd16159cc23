//! # Search Gateway
//!
//! Front door for every web search the pipeline makes. Callers always get a
//! non-empty batch back; failures show up as [`SearchOrigin::Fallback`].

use super::{
    BraveProvider, CacheKey, CacheStats, ProviderRoute, RateLimiter, ResearchDepth, SearchBatch,
    SearchCache, SearchDepth, SearchError, SearchOrigin, SearchProvider, SearchResult,
    TavilyProvider, MAX_COUNT, MIN_COUNT,
};
use crate::config::SearchConfig;
use std::sync::Arc;
use std::time::Duration;

/// Rate-limited, cached, multi-provider search
pub struct SearchGateway {
    primary: Arc<dyn SearchProvider>,
    secondary: Arc<dyn SearchProvider>,
    cache: Arc<SearchCache>,
    limiter: Arc<RateLimiter>,
    max_wait: Duration,
}

impl SearchGateway {
    /// Assemble a gateway from explicitly owned parts.
    ///
    /// `cache` and `limiter` are meant to be constructed once per process and
    /// shared by every gateway and session.
    pub fn new(
        primary: Arc<dyn SearchProvider>,
        secondary: Arc<dyn SearchProvider>,
        cache: Arc<SearchCache>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            primary,
            secondary,
            cache,
            limiter,
            max_wait: Duration::from_secs(30),
        }
    }

    /// Brave as primary, Tavily as secondary, settings from config
    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let primary = BraveProvider::new(config.brave_api_key.clone(), timeout)?;
        let secondary = TavilyProvider::new(config.tavily_api_key.clone(), timeout)?;
        let cache = SearchCache::new(
            config.cache_capacity,
            Duration::from_secs(config.cache_ttl_secs),
        );
        Ok(Self::new(
            Arc::new(primary),
            Arc::new(secondary),
            Arc::new(cache),
            Arc::new(RateLimiter::new(config.min_interval())),
        )
        .with_max_wait(config.max_wait()))
    }

    /// Longest a caller waits for the rate limiter before degrading
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Search, never failing.
    ///
    /// `count` is clamped to 1..=20. Provider errors and empty result sets
    /// yield up to three deterministic fallback entries, which are not cached.
    pub async fn search(&self, query: &str, count: u32, depth: ResearchDepth) -> SearchBatch {
        let count = count.clamp(MIN_COUNT, MAX_COUNT);
        let query = query.trim();

        match self.try_search(query, count, depth).await {
            Ok(batch) => batch,
            Err(error) => {
                tracing::warn!(query, %error, "Search degraded to fallback results");
                SearchBatch {
                    results: fallback_results(query, count),
                    origin: SearchOrigin::Fallback(error),
                }
            }
        }
    }

    async fn try_search(
        &self,
        query: &str,
        count: u32,
        depth: ResearchDepth,
    ) -> Result<SearchBatch, SearchError> {
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let key = CacheKey::new(query, count);
        if let Some(cached) = self.cache.get(&key).await {
            tracing::debug!(query, count, "Search cache hit");
            return Ok(SearchBatch {
                results: cached.as_ref().clone(),
                origin: SearchOrigin::Cache,
            });
        }

        let (provider, mode) = match depth.route() {
            ProviderRoute::Primary => (&self.primary, SearchDepth::Basic),
            ProviderRoute::Secondary(mode) => (&self.secondary, mode),
        };

        let results = {
            let _permit = self.limiter.acquire_within(self.max_wait).await?;
            provider.search(query, count, mode).await?
        };

        if results.is_empty() {
            return Err(SearchError::NoResults);
        }

        tracing::info!(
            query,
            provider = provider.name(),
            results = results.len(),
            "Search complete"
        );
        self.cache.insert(key, results.clone()).await;

        Ok(SearchBatch {
            results,
            origin: SearchOrigin::Provider(provider.name()),
        })
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
        tracing::info!("Search cache cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Deterministic stand-in results: at least one, at most three
pub fn fallback_results(query: &str, count: u32) -> Vec<SearchResult> {
    let query = if query.is_empty() { "this topic" } else { query };
    let n = count.clamp(MIN_COUNT, 3) as usize;
    vec![
        SearchResult {
            title: format!("Market Report: {}", query),
            url: "https://example.com/report1".to_string(),
            description: format!(
                "Comprehensive market analysis for {}. The market is experiencing significant \
                 growth with key trends emerging in technology adoption and consumer behavior.",
                query
            ),
        },
        SearchResult {
            title: format!("Industry Analysis: {}", query),
            url: "https://example.com/analysis1".to_string(),
            description: format!(
                "In-depth industry analysis covering {}. Key players include established \
                 companies and innovative startups competing for market share.",
                query
            ),
        },
        SearchResult {
            title: format!("Trends and Insights: {}", query),
            url: "https://example.com/trends1".to_string(),
            description: format!(
                "Latest trends and insights for {}. Market projections show strong growth \
                 potential with emerging opportunities in various segments.",
                query
            ),
        },
    ]
    .into_iter()
    .take(n)
    .collect()
}
