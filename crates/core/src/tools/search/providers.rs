//! # Search Providers
//!
//! - `BraveProvider` - primary provider, used at standard depth
//! - `TavilyProvider` - secondary provider with basic/advanced sub-modes

use super::{SearchDepth, SearchError, SearchProvider, SearchResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const BRAVE_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";
const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// Tavily descriptions are cut to this many characters
const TAVILY_DESCRIPTION_CHARS: usize = 500;

fn http_client(timeout: Duration) -> Result<reqwest::Client, SearchError> {
    reqwest::Client::builder()
        .user_agent("market-analyst/1.0")
        .timeout(timeout)
        .build()
        .map_err(|e| SearchError::Transport(format!("Failed to create HTTP client: {}", e)))
}

/// Brave Search web API
#[derive(Debug, Clone)]
pub struct BraveProvider {
    api_key: Option<String>,
    endpoint: String,
    client: reqwest::Client,
}

impl BraveProvider {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, SearchError> {
        Ok(Self {
            api_key,
            endpoint: BRAVE_ENDPOINT.to_string(),
            client: http_client(timeout)?,
        })
    }

    /// Point at a different endpoint (self-hosted proxy, tests)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
}

#[async_trait]
impl SearchProvider for BraveProvider {
    fn name(&self) -> &'static str {
        "brave"
    }

    async fn search(
        &self,
        query: &str,
        count: u32,
        _depth: SearchDepth,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(SearchError::MissingCredential { provider: "Brave" })?;

        let url = format!(
            "{}?q={}&count={}&search_lang=en&safesearch=moderate",
            self.endpoint,
            urlencoding::encode(query),
            count
        );

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", api_key)
            .send()
            .await
            .map_err(SearchError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(SearchError::from_status(response.status()));
        }

        let body: BraveResponse = response.json().await.map_err(SearchError::from_reqwest)?;

        Ok(body
            .web
            .map(|web| web.results)
            .unwrap_or_default()
            .into_iter()
            .take(count as usize)
            .map(|r| SearchResult {
                title: r.title,
                url: r.url,
                description: r.description,
            })
            .collect())
    }
}

/// Tavily search API
#[derive(Debug, Clone)]
pub struct TavilyProvider {
    api_key: Option<String>,
    endpoint: String,
    client: reqwest::Client,
}

impl TavilyProvider {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, SearchError> {
        Ok(Self {
            api_key,
            endpoint: TAVILY_ENDPOINT.to_string(),
            client: http_client(timeout)?,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    max_results: u32,
    include_answer: bool,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn search(
        &self,
        query: &str,
        count: u32,
        depth: SearchDepth,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(SearchError::MissingCredential { provider: "Tavily" })?;

        let response = self
            .client
            .post(&self.endpoint)
            .json(&TavilyRequest {
                api_key,
                query,
                search_depth: depth.as_str(),
                max_results: count,
                include_answer: false,
            })
            .send()
            .await
            .map_err(SearchError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(SearchError::from_status(response.status()));
        }

        let body: TavilyResponse = response.json().await.map_err(SearchError::from_reqwest)?;

        Ok(body
            .results
            .into_iter()
            .take(count as usize)
            .map(|r| SearchResult {
                title: r.title,
                url: r.url,
                description: r.content.chars().take(TAVILY_DESCRIPTION_CHARS).collect(),
            })
            .collect())
    }
}
