//! # Web Search
//!
//! Rate-limited, cached, multi-provider web search that never fails.
//!
//! ```text
//! search(query, count, depth)
//!   ├── cache hit ─────────────────────────────▶ cached batch
//!   └── miss ── rate limiter ── provider call
//!                                  ├── results ─▶ cache + return
//!                                  └── error ───▶ fallback batch (not cached)
//! ```

pub mod cache;
pub mod gateway;
pub mod providers;
pub mod rate_limit;

pub use cache::{CacheKey, CacheStats, SearchCache};
pub use gateway::{fallback_results, SearchGateway};
pub use providers::{BraveProvider, TavilyProvider};
pub use rate_limit::{RateLimitPermit, RateLimiter};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest and highest accepted result counts
pub const MIN_COUNT: u32 = 1;
pub const MAX_COUNT: u32 = 20;

/// A single search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub description: String,
}

/// Provider sub-mode for the secondary provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    Basic,
    Advanced,
}

impl SearchDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchDepth::Basic => "basic",
            SearchDepth::Advanced => "advanced",
        }
    }
}

/// Which provider a research depth routes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderRoute {
    Primary,
    Secondary(SearchDepth),
}

/// Requested research depth (1 = standard)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResearchDepth(pub u32);

impl Default for ResearchDepth {
    fn default() -> Self {
        ResearchDepth(1)
    }
}

impl ResearchDepth {
    /// 1 uses the primary provider; 2 the secondary in basic mode; 3+ advanced
    pub fn route(&self) -> ProviderRoute {
        match self.0 {
            0 | 1 => ProviderRoute::Primary,
            2 => ProviderRoute::Secondary(SearchDepth::Basic),
            _ => ProviderRoute::Secondary(SearchDepth::Advanced),
        }
    }

    /// Results requested per query at this depth
    pub fn results_per_query(&self) -> u32 {
        match self.route() {
            ProviderRoute::Primary => 3,
            ProviderRoute::Secondary(_) => 5,
        }
    }
}

/// Why a search degraded to fallback data
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("search query is empty")]
    EmptyQuery,
    #[error("{provider} API key is not configured")]
    MissingCredential { provider: &'static str },
    #[error("search request timed out")]
    Timeout,
    #[error("rate limit exceeded at provider")]
    RateLimited,
    #[error("invalid API key")]
    Unauthorized,
    #[error("HTTP error {0}")]
    Http(u16),
    #[error("search request failed: {0}")]
    Transport(String),
    #[error("failed to parse provider response: {0}")]
    Parse(String),
    #[error("no results found")]
    NoResults,
    #[error("gave up waiting {waited_ms}ms for the rate limiter")]
    RateBudgetExceeded { waited_ms: u64 },
}

impl SearchError {
    pub(crate) fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            SearchError::Timeout
        } else if error.is_decode() {
            SearchError::Parse(error.to_string())
        } else {
            SearchError::Transport(error.to_string())
        }
    }

    pub(crate) fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            429 => SearchError::RateLimited,
            401 | 403 => SearchError::Unauthorized,
            code => SearchError::Http(code),
        }
    }
}

/// Where a batch of results came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOrigin {
    Cache,
    Provider(&'static str),
    /// Deterministic fallback data, with the reason
    Fallback(SearchError),
}

impl SearchOrigin {
    pub fn is_degraded(&self) -> bool {
        matches!(self, SearchOrigin::Fallback(_))
    }
}

/// Results of one gateway search
#[derive(Debug, Clone)]
pub struct SearchBatch {
    pub results: Vec<SearchResult>,
    pub origin: SearchOrigin,
}

/// An upstream web search API
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(
        &self,
        query: &str,
        count: u32,
        depth: SearchDepth,
    ) -> Result<Vec<SearchResult>, SearchError>;
}
