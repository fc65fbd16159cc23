//! # Research API
//!
//! `POST /research` runs one session and streams its frames as SSE.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use analyst_core::state::ResearchRequest;
use analyst_core::swarm::{EventStream, Frame};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::ReceiverStream;
use utoipa::ToSchema;

use super::{ApiError, AppState, ErrorResponse};

/// Frames buffered between the session and a slow client
const STREAM_BUFFER: usize = 32;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResearchBody {
    /// Research topic, 1-500 characters
    pub topic: String,
    /// 1 = standard, 2 = deep, 3+ = deep with advanced search
    #[serde(default)]
    pub research_depth: Option<i64>,
}

fn to_event(frame: Frame) -> Event {
    Event::default()
        .event(frame.kind.as_str())
        .data(frame.data.to_string())
}

/// Start a research session
#[utoipa::path(
    post,
    path = "/research",
    tag = "research",
    request_body = ResearchBody,
    responses(
        (status = 200, description = "SSE stream of state frames ending in complete or error", content_type = "text/event-stream"),
        (status = 400, description = "Invalid topic", body = ErrorResponse)
    )
)]
pub async fn start_research(
    State(state): State<AppState>,
    Json(body): Json<ResearchBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let request = ResearchRequest::new(body.topic, body.research_depth.unwrap_or(1)).validate()?;
    tracing::info!(
        topic = %request.topic.chars().take(50).collect::<String>(),
        depth = request.depth.0,
        "Research requested"
    );

    let (events, rx) = EventStream::channel(STREAM_BUFFER);
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        orchestrator.run(request, events).await;
    });

    let stream = ReceiverStream::new(rx).map(|frame| Ok(to_event(frame)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
