//! Instrumentation hooks for an external metrics sink.

use super::pipeline::PipelineStage;
use crate::tools::search::SearchOrigin;
use serde::Serialize;
use std::time::Duration;

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Receives timing for every stage, search and session.
///
/// All methods default to no-ops.
pub trait StageObserver: Send + Sync {
    fn stage_finished(&self, _stage: PipelineStage, _elapsed: Duration, _success: bool) {}

    fn search_finished(&self, _query: &str, _origin: &SearchOrigin, _elapsed: Duration) {}

    fn session_finished(&self, _status: SessionStatus, _elapsed: Duration) {}
}

/// Logs every hook through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl StageObserver for TracingObserver {
    fn stage_finished(&self, stage: PipelineStage, elapsed: Duration, success: bool) {
        tracing::info!(
            stage = %stage,
            elapsed_ms = elapsed.as_millis() as u64,
            success,
            "Stage finished"
        );
    }

    fn search_finished(&self, query: &str, origin: &SearchOrigin, elapsed: Duration) {
        match origin {
            SearchOrigin::Fallback(e) => tracing::warn!(
                query,
                error = %e,
                elapsed_ms = elapsed.as_millis() as u64,
                "Search degraded to fallback"
            ),
            SearchOrigin::Cache => tracing::debug!(query, "Search served from cache"),
            SearchOrigin::Provider(name) => tracing::debug!(
                query,
                provider = *name,
                elapsed_ms = elapsed.as_millis() as u64,
                "Search finished"
            ),
        }
    }

    fn session_finished(&self, status: SessionStatus, elapsed: Duration) {
        tracing::info!(?status, elapsed_ms = elapsed.as_millis() as u64, "Session finished");
    }
}
