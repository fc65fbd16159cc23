//! # HTTP API
//!
//! Router, shared state and the OpenAPI document.

pub mod research;
pub mod tools;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Response, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use analyst_core::config::AnalystConfig;
use analyst_core::state::ValidationError;
use analyst_core::swarm::Orchestrator;
use analyst_core::tools::{DocumentFetcher, FetchError};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub fetcher: Arc<DocumentFetcher>,
    pub config: Arc<AnalystConfig>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        research::start_research,
        tools::fetch_document,
        tools::fetch_documents,
        tools::cache_stats,
        tools::clear_cache
    ),
    components(
        schemas(
            HealthResponse,
            ErrorResponse,
            research::ResearchBody,
            tools::FetchBody,
            tools::FetchResponse,
            tools::BatchFetchBody,
            tools::CacheStatsResponse,
            tools::CacheClearedResponse
        )
    ),
    tags(
        (name = "research", description = "Streaming research sessions"),
        (name = "tools", description = "Document fetch and search cache"),
        (name = "system", description = "Health and discovery")
    )
)]
pub struct ApiDoc;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    model: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
}

/// Errors surfaced to HTTP callers
#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    Fetch(FetchError),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        ApiError::Fetch(e)
    }
}

fn fetch_status(error: &FetchError) -> StatusCode {
    match error {
        FetchError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        FetchError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        FetchError::NotFound(_) => StatusCode::NOT_FOUND,
        FetchError::Forbidden(_) => StatusCode::FORBIDDEN,
        FetchError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        FetchError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        FetchError::Tls(_) | FetchError::Http { .. } | FetchError::Transport { .. } => {
            StatusCode::BAD_GATEWAY
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match &self {
            ApiError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    detail: e.to_string(),
                    kind: Some("validation".to_string()),
                },
            ),
            ApiError::Fetch(e) => (
                fetch_status(e),
                ErrorResponse {
                    detail: e.to_string(),
                    kind: Some(e.kind().to_string()),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// Health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        model: state.orchestrator.model_name().to_string(),
    })
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "service": "Market Analyst",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "research": "POST /research",
            "health": "GET /health",
            "fetch": "POST /api/v1/fetch",
            "fetch_batch": "POST /api/v1/fetch/batch",
            "search_cache": "GET|DELETE /api/v1/search/cache",
            "openapi": "GET /api/v1/openapi.json"
        }
    }))
}

async fn serve_openapi() -> impl IntoResponse {
    let spec = ApiDoc::openapi().to_json().unwrap_or_default();
    Response::builder()
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(spec))
        .unwrap_or_default()
}

fn cors(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring malformed CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}

pub fn router(state: AppState) -> Router {
    let tool_routes = Router::new()
        .route("/fetch", post(tools::fetch_document))
        .route("/fetch/batch", post(tools::fetch_documents))
        .route(
            "/search/cache",
            get(tools::cache_stats).delete(tools::clear_cache),
        )
        .route("/openapi.json", get(serve_openapi));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/research", post(research::start_research))
        .nest("/api/v1", tool_routes)
        .layer(cors(&state.config.server.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use analyst_core::models::{GenerationError, TextGenerator};
    use analyst_core::tools::SearchGateway;
    use async_trait::async_trait;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    /// Always fails, so sessions end at planning without touching the network
    pub(crate) struct OfflineGenerator;

    #[async_trait]
    impl TextGenerator for OfflineGenerator {
        async fn generate(&self, _prompt: &str, _temperature: f32) -> Result<String, GenerationError> {
            Err(GenerationError::Other("offline".to_string()))
        }

        fn model_name(&self) -> &str {
            "offline-model"
        }
    }

    pub(crate) fn test_state() -> AppState {
        let config = AnalystConfig::default();
        let search = SearchGateway::from_config(&config.search).unwrap();
        let orchestrator = Orchestrator::new(Arc::new(OfflineGenerator), Arc::new(search));
        AppState {
            orchestrator: Arc::new(orchestrator),
            fetcher: Arc::new(DocumentFetcher::new(config.fetch.clone()).unwrap()),
            config: Arc::new(config),
        }
    }

    pub(crate) async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_model() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model"], "offline-model");
    }

    #[tokio::test]
    async fn test_openapi_lists_research_route() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::get("/api/v1/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_text(response).await;
        assert!(body.contains("/research"));
        assert!(body.contains("/api/v1/fetch"));
    }

    #[test]
    fn test_fetch_error_statuses() {
        assert_eq!(
            fetch_status(&FetchError::InvalidInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            fetch_status(&FetchError::Timeout("x".into())),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            fetch_status(&FetchError::TooLarge {
                url: "x".into(),
                limit_kb: 1
            }),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            fetch_status(&FetchError::Http {
                status: 500,
                url: "x".into()
            }),
            StatusCode::BAD_GATEWAY
        );
    }
}
