//! # Analyst Models
//!
//! Text generation providers for the research pipeline.
//!
//! Every stage talks to the model through the [`TextGenerator`] trait:
//! a prompt and a temperature go in, text comes out. Provider failures are
//! opaque [`GenerationError`]s; the orchestrator decides whether they are
//! fatal.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

/// Supported LLM providers
///
/// - Gemini (Google) - `GEMINI_API_KEY` or `GOOGLE_API_KEY`
/// - OpenAI (and any OpenAI-compatible endpoint) - `OPENAI_API_KEY`
/// - Anthropic (Claude) - `ANTHROPIC_API_KEY`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Gemini,
    #[serde(rename = "openai")]
    OpenAI,
    Anthropic,
}

impl LlmProvider {
    /// Parse a provider name, as found in `LLM_PROVIDER`
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Some(LlmProvider::Gemini),
            "openai" => Some(LlmProvider::OpenAI),
            "anthropic" | "claude" => Some(LlmProvider::Anthropic),
            _ => None,
        }
    }

    /// Display name for logs and the health endpoint
    pub fn display_name(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "Gemini",
            LlmProvider::OpenAI => "OpenAI",
            LlmProvider::Anthropic => "Anthropic",
        }
    }

    /// Environment variables holding the API key, in lookup order
    pub fn key_vars(&self) -> &'static [&'static str] {
        match self {
            LlmProvider::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            LlmProvider::OpenAI => &["OPENAI_API_KEY"],
            LlmProvider::Anthropic => &["ANTHROPIC_API_KEY"],
        }
    }

    /// Model used when none is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini-2.0-flash",
            LlmProvider::OpenAI => "gpt-4o",
            LlmProvider::Anthropic => "claude-sonnet-4-20250514",
        }
    }

    /// Whether this provider supports custom base URL
    pub fn supports_base_url(&self) -> bool {
        matches!(self, LlmProvider::OpenAI)
    }
}

/// Configuration for LLM model selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// LLM provider to use
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model name (e.g., "gemini-2.0-flash", "gpt-4o")
    pub model: String,
    /// Optional base URL override for OpenAI-compatible APIs
    pub base_url: Option<String>,
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::with_provider(LlmProvider::Gemini, LlmProvider::Gemini.default_model())
    }
}

impl ModelConfig {
    /// Create config for a specific provider
    pub fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Set base URL (for OpenAI-compatible endpoints)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Look up the provider's API key in the environment
    pub fn api_key_from_env(&self) -> Option<String> {
        self.provider
            .key_vars()
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .map(|key| key.trim().to_string())
            .find(|key| !key.is_empty() && !crate::config::is_placeholder(key))
    }
}

/// Failure of a single text generation call
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{provider} API key is not configured")]
    MissingCredential { provider: &'static str },

    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} returned no text")]
    EmptyResponse { provider: &'static str },

    #[error("{0}")]
    Other(String),
}

/// Synchronous request/response text generation
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text from a prompt at the given temperature
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, GenerationError>;

    /// Model identifier, reported by the health endpoint
    fn model_name(&self) -> &str;
}

/// HTTP client for the configured provider
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: ModelConfig,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl LlmClient {
    /// Build a client, reading the API key from the environment.
    ///
    /// A missing key is not an error here: the service still starts and
    /// every generation call fails with [`GenerationError::MissingCredential`].
    pub fn from_config(config: ModelConfig) -> Result<Self, GenerationError> {
        let api_key = config.api_key_from_env();
        Self::new(config, api_key)
    }

    /// Build a client with an explicit API key
    pub fn new(config: ModelConfig, api_key: Option<String>) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Other(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            config,
            api_key,
            http,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn key(&self) -> Result<&str, GenerationError> {
        self.api_key
            .as_deref()
            .ok_or(GenerationError::MissingCredential {
                provider: self.config.provider.display_name(),
            })
    }

    async fn post_json(
        &self,
        request: reqwest::RequestBuilder,
        body: Value,
    ) -> Result<Value, GenerationError> {
        let provider = self.config.provider.display_name();
        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|source| GenerationError::Transport { provider, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                provider,
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|source| GenerationError::Transport { provider, source })
    }

    async fn generate_gemini(&self, prompt: &str, temperature: f32) -> Result<String, GenerationError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            urlencoding::encode(&self.config.model)
        );
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": temperature }
        });
        let request = self.http.post(url).header("x-goog-api-key", self.key()?);
        let value = self.post_json(request, body).await?;

        let text: String = value
            .pointer("/candidates/0/content/parts")
            .and_then(|p| p.as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                    .collect()
            })
            .unwrap_or_default();
        non_empty(text, "Gemini")
    }

    async fn generate_openai(&self, prompt: &str, temperature: f32) -> Result<String, GenerationError> {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1");
        let url = format!("{}/chat/completions", base.trim_end_matches('/'));
        let body = json!({
            "model": self.config.model,
            "temperature": temperature,
            "messages": [{ "role": "user", "content": prompt }]
        });
        let request = self.http.post(url).bearer_auth(self.key()?);
        let value = self.post_json(request, body).await?;

        let text = value
            .pointer("/choices/0/message/content")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();
        non_empty(text, "OpenAI")
    }

    async fn generate_anthropic(&self, prompt: &str, temperature: f32) -> Result<String, GenerationError> {
        let body = json!({
            "model": self.config.model,
            "max_tokens": 8192,
            "temperature": temperature,
            "messages": [{ "role": "user", "content": prompt }]
        });
        let request = self
            .http
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", self.key()?)
            .header("anthropic-version", "2023-06-01");
        let value = self.post_json(request, body).await?;

        let text: String = value
            .get("content")
            .and_then(|c| c.as_array())
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                    .collect()
            })
            .unwrap_or_default();
        non_empty(text, "Anthropic")
    }
}

fn non_empty(text: String, provider: &'static str) -> Result<String, GenerationError> {
    if text.trim().is_empty() {
        Err(GenerationError::EmptyResponse { provider })
    } else {
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, GenerationError> {
        tracing::debug!(
            provider = self.config.provider.display_name(),
            model = %self.config.model,
            prompt_chars = prompt.len(),
            temperature,
            "Generating text"
        );
        match self.config.provider {
            LlmProvider::Gemini => self.generate_gemini(prompt, temperature).await,
            LlmProvider::OpenAI => self.generate_openai(prompt, temperature).await,
            LlmProvider::Anthropic => self.generate_anthropic(prompt, temperature).await,
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
