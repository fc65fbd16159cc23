//! # Tools API
//!
//! Document fetch and search cache maintenance.

use axum::{extract::State, Json};
use analyst_core::tools::FetchOutcome;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use super::{ApiError, AppState, ErrorResponse};

#[derive(Debug, Deserialize, ToSchema)]
pub struct FetchBody {
    pub url: String,
    /// Defaults to the configured `FETCH_MAX_SIZE_KB`
    #[serde(default)]
    pub max_size_kb: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FetchResponse {
    pub url: String,
    pub content: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchFetchBody {
    pub urls: Vec<String>,
    #[serde(default)]
    pub max_size_kb: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CacheStatsResponse {
    pub entry_count: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CacheClearedResponse {
    pub cleared: bool,
}

/// Fetch one document and extract its text
#[utoipa::path(
    post,
    path = "/api/v1/fetch",
    tag = "tools",
    request_body = FetchBody,
    responses(
        (status = 200, description = "Extracted text", body = FetchResponse),
        (status = 400, description = "Invalid URL", body = ErrorResponse),
        (status = 404, description = "Document not found", body = ErrorResponse),
        (status = 413, description = "Document over the size limit", body = ErrorResponse),
        (status = 502, description = "Upstream failure", body = ErrorResponse),
        (status = 504, description = "Upstream timeout", body = ErrorResponse)
    )
)]
pub async fn fetch_document(
    State(state): State<AppState>,
    Json(body): Json<FetchBody>,
) -> Result<Json<FetchResponse>, ApiError> {
    let max_size_kb = body.max_size_kb.unwrap_or(state.config.fetch.max_size_kb);
    let content = state.fetcher.fetch(&body.url, max_size_kb).await?;
    Ok(Json(FetchResponse {
        url: body.url,
        content,
    }))
}

/// Fetch several documents; failures are reported per URL
#[utoipa::path(
    post,
    path = "/api/v1/fetch/batch",
    tag = "tools",
    request_body = BatchFetchBody,
    responses(
        (status = 200, description = "Outcome per URL")
    )
)]
pub async fn fetch_documents(
    State(state): State<AppState>,
    Json(body): Json<BatchFetchBody>,
) -> Json<BTreeMap<String, FetchOutcome>> {
    let max_size_kb = body.max_size_kb.unwrap_or(state.config.fetch.max_size_kb);
    Json(state.fetcher.fetch_many(&body.urls, max_size_kb).await)
}

/// Search cache statistics
#[utoipa::path(
    get,
    path = "/api/v1/search/cache",
    tag = "tools",
    responses(
        (status = 200, description = "Cache statistics", body = CacheStatsResponse)
    )
)]
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    let stats = state.orchestrator.search().cache_stats();
    Json(CacheStatsResponse {
        entry_count: stats.entry_count,
        hits: stats.hits,
        misses: stats.misses,
        hit_rate: stats.hit_rate,
    })
}

/// Drop every cached search result
#[utoipa::path(
    delete,
    path = "/api/v1/search/cache",
    tag = "tools",
    responses(
        (status = 200, description = "Cache cleared", body = CacheClearedResponse)
    )
)]
pub async fn clear_cache(State(state): State<AppState>) -> Json<CacheClearedResponse> {
    state.orchestrator.search().clear_cache().await;
    tracing::info!("Search cache cleared");
    Json(CacheClearedResponse { cleared: true })
}
