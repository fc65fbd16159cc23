//! # Research Session
//!
//! Per-request state. Created when a request starts, mutated only by the
//! orchestrator, dropped when the stream closes.

use crate::skills::chart_skill::ChartSpec;
use crate::swarm::pipeline::{Pipeline, PipelineStage};
use crate::tools::search::{ResearchDepth, SearchResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One research session
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    topic: String,
    depth: ResearchDepth,
    pipeline: Pipeline,
    logs: Vec<String>,
    strategy: Option<String>,
    sources: Option<Vec<SearchResult>>,
    raw_findings: Option<String>,
    insights: Option<String>,
    charts: Option<Vec<ChartSpec>>,
    final_report: Option<String>,
}

/// Point-in-time view of a session, as streamed in `state` frames.
///
/// Only fields produced so far are present.
#[derive(Debug, Serialize)]
pub struct SessionSnapshot<'a> {
    pub current_step: PipelineStage,
    pub logs: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<&'a [SearchResult]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_data: Option<ChartData<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_report: Option<&'a str>,
}

/// `{"charts": [...]}`
#[derive(Debug, Serialize)]
pub struct ChartData<'a> {
    pub charts: &'a [ChartSpec],
}

impl Session {
    pub fn new(topic: impl Into<String>, depth: ResearchDepth) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            topic: topic.into(),
            depth,
            pipeline: Pipeline::new(),
            logs: Vec::new(),
            strategy: None,
            sources: None,
            raw_findings: None,
            insights: None,
            charts: None,
            final_report: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn depth(&self) -> ResearchDepth {
        self.depth
    }

    pub fn stage(&self) -> PipelineStage {
        self.pipeline.stage
    }

    pub fn is_finished(&self) -> bool {
        self.pipeline.is_complete()
    }

    /// Move to the next stage; returns the new stage
    pub fn advance(&mut self) -> PipelineStage {
        self.pipeline.advance();
        self.pipeline.stage
    }

    pub fn fail(&mut self) {
        self.pipeline.fail();
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn strategy(&self) -> Option<&str> {
        self.strategy.as_deref()
    }

    pub fn sources(&self) -> &[SearchResult] {
        self.sources.as_deref().unwrap_or_default()
    }

    pub fn raw_findings(&self) -> Option<&str> {
        self.raw_findings.as_deref()
    }

    pub fn insights(&self) -> Option<&str> {
        self.insights.as_deref()
    }

    pub fn charts(&self) -> &[ChartSpec] {
        self.charts.as_deref().unwrap_or_default()
    }

    pub fn final_report(&self) -> Option<&str> {
        self.final_report.as_deref()
    }

    /// Finished sessions are immutable; returns whether the write happened
    fn writable(&self) -> bool {
        if self.is_finished() {
            tracing::warn!(session_id = %self.id, "Ignoring write to finished session");
            return false;
        }
        true
    }

    /// Append a progress line
    pub fn log(&mut self, line: impl Into<String>) {
        if self.writable() {
            self.logs.push(line.into());
        }
    }

    pub fn set_strategy(&mut self, strategy: String) {
        if self.writable() {
            self.strategy = Some(strategy);
        }
    }

    pub fn extend_sources(&mut self, batch: Vec<SearchResult>) {
        if self.writable() {
            self.sources.get_or_insert_with(Vec::new).extend(batch);
        }
    }

    /// Mark sources as gathered even when nothing came back
    pub fn touch_sources(&mut self) {
        if self.writable() {
            self.sources.get_or_insert_with(Vec::new);
        }
    }

    pub fn set_raw_findings(&mut self, findings: String) {
        if self.writable() {
            self.raw_findings = Some(findings);
        }
    }

    pub fn set_insights(&mut self, insights: String) {
        if self.writable() {
            self.insights = Some(insights);
        }
    }

    pub fn set_charts(&mut self, charts: Vec<ChartSpec>) {
        if self.writable() {
            self.charts = Some(charts);
        }
    }

    pub fn set_final_report(&mut self, report: String) {
        if self.writable() {
            self.final_report = Some(report);
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot<'_> {
        SessionSnapshot {
            current_step: self.stage(),
            logs: &self.logs,
            strategy: self.strategy.as_deref(),
            sources: self.sources.as_deref(),
            raw_data: self.raw_findings.as_deref(),
            insights: self.insights.as_deref(),
            chart_data: self.charts.as_deref().map(|charts| ChartData { charts }),
            final_report: self.final_report.as_deref(),
        }
    }
}
