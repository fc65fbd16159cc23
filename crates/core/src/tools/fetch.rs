//! # Document Fetcher
//!
//! Bounded HTTP retrieval and main-content extraction for a single URL.
//!
//! Unlike the search gateway, failures here are raised as typed
//! [`FetchError`]s. URL validation happens before any network I/O.

use crate::config::FetchConfig;
use futures::StreamExt;
use scraper::{Html, Selector};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Elements that never carry main content
const STRIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "nav", "header", "footer", "aside"];

/// Content regions, most specific first
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role=\"main\"]",
    ".content",
    "#content",
    ".post",
    ".entry-content",
];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("request timed out for URL: {0}")]
    Timeout(String),
    #[error("document not found (404): {0}")]
    NotFound(String),
    #[error("access forbidden (403): {0}")]
    Forbidden(String),
    #[error("rate limited (429): {0}")]
    RateLimited(String),
    #[error("TLS certificate error for URL: {0}")]
    Tls(String),
    #[error("HTTP error {status}: {url}")]
    Http { status: u16, url: String },
    #[error("request failed for {url}: {message}")]
    Transport { url: String, message: String },
    #[error("document exceeded size limit (max {limit_kb}KB): {url}")]
    TooLarge { url: String, limit_kb: usize },
}

impl FetchError {
    /// Stable machine-readable name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::InvalidInput(_) => "invalid_input",
            FetchError::Timeout(_) => "timeout",
            FetchError::NotFound(_) => "not_found",
            FetchError::Forbidden(_) => "forbidden",
            FetchError::RateLimited(_) => "rate_limited",
            FetchError::Tls(_) => "tls_error",
            FetchError::Http { .. } => "http_error",
            FetchError::Transport { .. } => "transport_error",
            FetchError::TooLarge { .. } => "too_large",
        }
    }

    fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return FetchError::Timeout(url.to_string());
        }
        if is_tls_failure(&error) {
            return FetchError::Tls(url.to_string());
        }
        FetchError::Transport {
            url: url.to_string(),
            message: error.to_string(),
        }
    }

    fn from_status(url: &str, status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            404 => FetchError::NotFound(url.to_string()),
            403 => FetchError::Forbidden(url.to_string()),
            429 => FetchError::RateLimited(url.to_string()),
            code => FetchError::Http {
                status: code,
                url: url.to_string(),
            },
        }
    }
}

/// reqwest does not expose TLS failures as a kind; look through the chain
fn is_tls_failure(error: &reqwest::Error) -> bool {
    let mut source: Option<&dyn std::error::Error> = Some(error);
    while let Some(err) = source {
        let message = err.to_string().to_ascii_lowercase();
        if message.contains("certificate") || message.contains("tls") || message.contains("ssl") {
            return true;
        }
        source = err.source();
    }
    false
}

/// Check a URL without touching the network
pub fn validate_url(raw: &str) -> Result<Url, FetchError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FetchError::InvalidInput("URL cannot be empty".to_string()));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| FetchError::InvalidInput(format!("Invalid URL '{}': {}", trimmed, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::InvalidInput(format!(
            "Unsupported URL scheme: {}. Only http/https allowed.",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(FetchError::InvalidInput(format!(
            "Invalid URL format: {}",
            trimmed
        )));
    }

    Ok(url)
}

/// Outcome of one URL in a batch fetch
#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fetches web pages and extracts their readable text
#[derive(Debug, Clone)]
pub struct DocumentFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl DocumentFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch `url` and extract its main text, reading at most `max_size_kb`
    pub async fn fetch(&self, url: &str, max_size_kb: usize) -> Result<String, FetchError> {
        let parsed = validate_url(url)?;
        let url = parsed.as_str().to_string();
        let max_bytes = max_size_kb.saturating_mul(1024);

        let response = self
            .client
            .get(parsed)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.5")
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(&url, status));
        }

        let too_large = || FetchError::TooLarge {
            url: url.clone(),
            limit_kb: max_size_kb,
        };

        if response
            .content_length()
            .is_some_and(|len| len as usize > max_bytes)
        {
            return Err(too_large());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        // Content-Length may be missing or lie; count what actually arrives
        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::from_reqwest(&url, e))?;
            body.extend_from_slice(&chunk);
            if body.len() > max_bytes {
                return Err(too_large());
            }
        }

        if !content_type.to_ascii_lowercase().contains("text/html") {
            return Ok(format!(
                "Document at {} (Content-Type: {})\nNote: Non-HTML content. Size: {} bytes.",
                url,
                content_type,
                body.len()
            ));
        }

        let html = String::from_utf8_lossy(&body);
        let text = extract_main_text(&html);
        let text = truncate_chars(&text, self.config.max_chars);

        if text.chars().count() < self.config.min_chars {
            return Ok(format!(
                "Document at {}\nNote: Minimal content extracted. The page may be JavaScript-heavy or have restricted access.",
                url
            ));
        }

        tracing::info!(url = %url, chars = text.chars().count(), "Fetched document");
        Ok(format!("Document from: {}\n\n{}", url, text))
    }

    /// Fetch several URLs one after another, recording each outcome
    pub async fn fetch_many(
        &self,
        urls: &[String],
        max_size_kb: usize,
    ) -> BTreeMap<String, FetchOutcome> {
        let mut outcomes = BTreeMap::new();
        for url in urls {
            let outcome = match self.fetch(url, max_size_kb).await {
                Ok(content) => FetchOutcome {
                    success: true,
                    content: Some(content),
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(url = %url, kind = e.kind(), "Failed to fetch document: {}", e);
                    FetchOutcome {
                        success: false,
                        content: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.insert(url.clone(), outcome);
        }
        outcomes
    }
}

/// Strip boilerplate elements and pull text from the best content region
pub fn extract_main_text(html: &str) -> String {
    let mut document = Html::parse_document(html);

    let stripped: Vec<_> = STRIPPED_ELEMENTS
        .iter()
        .filter_map(|tag| Selector::parse(tag).ok())
        .flat_map(|selector| {
            document
                .select(&selector)
                .map(|element| element.id())
                .collect::<Vec<_>>()
        })
        .collect();
    for id in stripped {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    let region = CONTENT_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| document.select(&selector).next());

    let raw: Vec<&str> = match region {
        Some(element) => element.text().collect(),
        None => document.root_element().text().collect(),
    };

    raw.into_iter()
        .flat_map(str::lines)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cut `text` to `max_chars` characters, appending a truncation marker
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars).collect();
    format!(
        "{}\n\n[Content truncated. Full document: {} characters]",
        kept, total
    )
}
