//! # Configuration
//!
//! Environment-driven settings for the generator, the search gateway,
//! the document fetcher and the HTTP shell.

use crate::models::{LlmProvider, ModelConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalystConfig {
    #[serde(default)]
    pub llm: ModelConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Search gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Brave Search subscription token (primary provider)
    #[serde(skip_serializing)]
    pub brave_api_key: Option<String>,
    /// Tavily API key (secondary provider)
    #[serde(skip_serializing)]
    pub tavily_api_key: Option<String>,
    /// Minimum spacing between outbound search calls
    pub min_interval_ms: u64,
    /// Longest a caller will wait for the rate limiter before degrading
    pub max_wait_ms: u64,
    /// Maximum cached `(query, count)` entries
    pub cache_capacity: u64,
    /// Cache entry lifetime
    pub cache_ttl_secs: u64,
    /// Per-request timeout for provider calls
    pub request_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            brave_api_key: None,
            tavily_api_key: None,
            min_interval_ms: 1000,
            max_wait_ms: 30_000,
            cache_capacity: 100,
            cache_ttl_secs: 3600,
            request_timeout_secs: 10,
        }
    }
}

impl SearchConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

/// Document fetcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Default body budget when the caller does not pass one
    pub max_size_kb: usize,
    /// Extracted text beyond this many characters is truncated
    pub max_chars: usize,
    /// Extracted text shorter than this yields the minimal-content note
    pub min_chars: usize,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_size_kb: 500,
            max_chars: 10_000,
            min_chars: 50,
            user_agent: "Mozilla/5.0 (compatible; MarketAnalyst/1.0; +https://example.com/bot)"
                .to_string(),
        }
    }
}

/// HTTP shell settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl AnalystConfig {
    /// Load configuration from process environment variables.
    ///
    /// Unparseable numeric values fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let secret = |key: &str| get(key).filter(|v| !is_placeholder(v));
        let number = |key: &str, default: u64| {
            get(key)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
        };

        let provider = get("LLM_PROVIDER")
            .and_then(|p| LlmProvider::parse(&p))
            .unwrap_or_default();
        let model = get("LLM_MODEL")
            .or_else(|| {
                if provider == LlmProvider::Gemini {
                    get("GEMINI_MODEL")
                } else {
                    None
                }
            })
            .unwrap_or_else(|| provider.default_model().to_string());
        let mut llm = ModelConfig::with_provider(provider, model);
        if llm.provider.supports_base_url() {
            llm.base_url = get("LLM_BASE_URL");
        }

        let search_defaults = SearchConfig::default();
        let search = SearchConfig {
            brave_api_key: secret("BRAVE_SEARCH_API_KEY"),
            tavily_api_key: secret("TAVILY_API_KEY"),
            min_interval_ms: number("SEARCH_MIN_INTERVAL_MS", search_defaults.min_interval_ms),
            max_wait_ms: number("SEARCH_MAX_WAIT_MS", search_defaults.max_wait_ms),
            cache_capacity: number("SEARCH_CACHE_CAPACITY", search_defaults.cache_capacity),
            cache_ttl_secs: number("SEARCH_CACHE_TTL_SECS", search_defaults.cache_ttl_secs),
            request_timeout_secs: search_defaults.request_timeout_secs,
        };

        let fetch_defaults = FetchConfig::default();
        let fetch = FetchConfig {
            max_size_kb: number("FETCH_MAX_SIZE_KB", fetch_defaults.max_size_kb as u64) as usize,
            ..fetch_defaults
        };

        let server_defaults = ServerConfig::default();
        let server = ServerConfig {
            port: get("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(server_defaults.port),
            allowed_origins: get("ALLOWED_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or(server_defaults.allowed_origins),
        };

        Self {
            llm,
            search,
            fetch,
            server,
        }
    }

    /// Human-readable warnings about incomplete configuration
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.llm.api_key_from_env().is_none() {
            warnings.push(format!(
                "{} is not set; every research session will fail at the planning stage",
                self.llm.provider.key_vars().join(" / ")
            ));
        }
        if self.search.brave_api_key.is_none() {
            warnings.push(
                "BRAVE_SEARCH_API_KEY is not set; standard-depth searches use fallback data"
                    .to_string(),
            );
        }
        if self.search.tavily_api_key.is_none() {
            warnings.push(
                "TAVILY_API_KEY is not set; deep searches use fallback data".to_string(),
            );
        }
        if self.server.allowed_origins.is_empty() {
            warnings.push("ALLOWED_ORIGINS is empty; browsers will be refused by CORS".to_string());
        }
        warnings
    }
}

/// Template values like `your_brave_search_api_key_here` count as unset
pub(crate) fn is_placeholder(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.starts_with("your_") || lower.ends_with("_here")
}
