//! # Research Orchestrator
//!
//! Drives one session through the pipeline and streams its progress.
//!
//! ## Stage Flow
//!
//! ```text
//! planning → gathering → analyzing → visualizing → synthesizing → complete
//!     └──────────┴───────────┴─────────────┴─────────────┴──→ failed
//! ```
//!
//! Generation failures in planning, gathering, analyzing and synthesizing are
//! fatal. Search, chart and report-splice failures are absorbed and only show
//! up as log lines.

use super::events::{CompletePayload, ErrorPayload, EventStream, FrameKind, StreamError};
use super::observer::{SessionStatus, StageObserver, TracingObserver};
use super::pipeline::PipelineStage;
use crate::models::{GenerationError, TextGenerator};
use crate::skills::chart_skill::ChartExtractor;
use crate::skills::prompts::{self, temperature};
use crate::skills::report_skill::{AssembleError, ReportAssembler};
use crate::state::{Session, ValidatedRequest};
use crate::tools::search::{SearchGateway, SearchOrigin, SearchResult};
use regex::Regex;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use thiserror::Error;

/// Most queries taken from the extraction call
pub const MAX_QUERIES: usize = 5;

/// Most sources handed to the findings call
pub const MAX_SOURCES_FOR_FINDINGS: usize = 15;

const STAGES: [PipelineStage; 5] = [
    PipelineStage::Planning,
    PipelineStage::Gathering,
    PipelineStage::Analyzing,
    PipelineStage::Visualizing,
    PipelineStage::Synthesizing,
];

/// Error that ends a session
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage} failed: {source}")]
    Generation {
        stage: PipelineStage,
        #[source]
        source: GenerationError,
    },

    #[error("client disconnected")]
    Cancelled,

    #[error(transparent)]
    Stream(StreamError),
}

impl From<StreamError> for StageError {
    fn from(e: StreamError) -> Self {
        match e {
            StreamError::Closed => StageError::Cancelled,
            other => StageError::Stream(other),
        }
    }
}

/// How a session ended, with its final state
#[derive(Debug)]
pub enum SessionOutcome {
    Completed(Session),
    Failed { session: Session, error: StageError },
    Cancelled(Session),
}

impl SessionOutcome {
    pub fn session(&self) -> &Session {
        match self {
            SessionOutcome::Completed(session)
            | SessionOutcome::Failed { session, .. }
            | SessionOutcome::Cancelled(session) => session,
        }
    }

    pub fn status(&self) -> SessionStatus {
        match self {
            SessionOutcome::Completed(_) => SessionStatus::Completed,
            SessionOutcome::Failed { .. } => SessionStatus::Failed,
            SessionOutcome::Cancelled(_) => SessionStatus::Cancelled,
        }
    }
}

/// Runs research sessions. One instance serves any number of concurrent
/// sessions; the search gateway's cache and rate limiter are shared by all.
pub struct Orchestrator {
    llm: Arc<dyn TextGenerator>,
    search: Arc<SearchGateway>,
    charts: ChartExtractor,
    assembler: ReportAssembler,
    observer: Arc<dyn StageObserver>,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn TextGenerator>, search: Arc<SearchGateway>) -> Self {
        Self {
            charts: ChartExtractor::new(llm.clone()),
            llm,
            search,
            assembler: ReportAssembler::new(),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the default tracing observer
    pub fn with_observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    pub fn search(&self) -> &SearchGateway {
        &self.search
    }

    /// Run one session to its end.
    ///
    /// Emits `state` frames as the session progresses and exactly one
    /// terminal frame, unless the consumer disconnects first.
    #[tracing::instrument(
        skip(self, request, events),
        fields(
            topic_preview = %request.topic.chars().take(50).collect::<String>(),
            depth = request.depth.0
        )
    )]
    pub async fn run(&self, request: ValidatedRequest, mut events: EventStream) -> SessionOutcome {
        let started = Instant::now();
        let mut session = Session::new(request.topic, request.depth);
        tracing::info!(
            session_id = %session.id(),
            created_at = %session.created_at(),
            "Research session started"
        );

        let outcome = match self.drive(&mut session, &mut events).await {
            Ok(()) => SessionOutcome::Completed(session),
            Err(StageError::Cancelled) => {
                tracing::info!(
                    session_id = %session.id(),
                    stage = %session.stage(),
                    "Client disconnected, abandoning session"
                );
                session.fail();
                SessionOutcome::Cancelled(session)
            }
            Err(error) => {
                let message = error.to_string();
                tracing::error!(session_id = %session.id(), error = %message, "Research session failed");
                session.log(format!("❌ Error: {}", message));
                session.fail();
                let payload = ErrorPayload {
                    error: &message,
                    logs: session.logs(),
                };
                if let Err(e) = events.emit(FrameKind::Error, &payload).await {
                    tracing::debug!(error = %e, "Could not deliver error frame");
                }
                SessionOutcome::Failed { session, error }
            }
        };

        self.observer
            .session_finished(outcome.status(), started.elapsed());
        outcome
    }

    async fn drive(&self, session: &mut Session, events: &mut EventStream) -> Result<(), StageError> {
        for stage in STAGES {
            session.advance();
            let started = Instant::now();
            let result = match stage {
                PipelineStage::Planning => self.plan(session, events).await,
                PipelineStage::Gathering => self.gather(session, events).await,
                PipelineStage::Analyzing => self.analyze(session, events).await,
                PipelineStage::Visualizing => self.visualize(session, events).await,
                _ => self.synthesize(session, events).await,
            };
            self.observer
                .stage_finished(stage, started.elapsed(), result.is_ok());
            result?;
        }

        session.log("✅ Research complete!");
        session.advance();
        publish(session, events).await?;

        let report = session.final_report().unwrap_or_default();
        events
            .emit(FrameKind::Complete, &CompletePayload::success(report))
            .await?;
        tracing::info!(session_id = %session.id(), "Research session complete");
        Ok(())
    }

    async fn plan(&self, session: &mut Session, events: &mut EventStream) -> Result<(), StageError> {
        log(session, events, "🚀 Research started...").await?;
        log(session, events, "📋 Strategist is breaking down the topic...").await?;

        let prompt = prompts::render(prompts::STRATEGIST, &[("topic", session.topic())]);
        let strategy = self
            .generate(PipelineStage::Planning, &prompt, temperature::STRATEGY, events)
            .await?;

        session.set_strategy(strategy);
        log(session, events, "✓ Strategy complete").await
    }

    async fn gather(&self, session: &mut Session, events: &mut EventStream) -> Result<(), StageError> {
        log(session, events, "🔍 Researcher is collecting market data...").await?;

        let prompt = prompts::render(
            prompts::QUERY_EXTRACTOR,
            &[("strategy", session.strategy().unwrap_or_default())],
        );
        let raw = self
            .generate(PipelineStage::Gathering, &prompt, temperature::QUERIES, events)
            .await?;
        let queries = extract_queries(&raw, session.topic());
        tracing::debug!(?queries, "Extracted search queries");
        log(
            session,
            events,
            format!("  → Generated {} search queries", queries.len()),
        )
        .await?;

        let depth = session.depth();
        let count = depth.results_per_query();
        let total = queries.len();
        for (i, query) in queries.iter().enumerate() {
            let preview: String = query.chars().take(50).collect();
            log(
                session,
                events,
                format!("  → Search {}/{}: {}...", i + 1, total, preview),
            )
            .await?;

            let started = Instant::now();
            let batch = until_closed(events, self.search.search(query, count, depth)).await?;
            self.observer
                .search_finished(query, &batch.origin, started.elapsed());

            let degraded = batch.origin.is_degraded();
            if let SearchOrigin::Fallback(e) = &batch.origin {
                tracing::warn!(query = %query, error = %e, "Search failed, using fallback data");
            }
            session.extend_sources(batch.results);
            if degraded {
                log(
                    session,
                    events,
                    format!("  ⚠️ Search {} warning: Using fallback data", i + 1),
                )
                .await?;
            }
        }
        session.touch_sources();
        publish(session, events).await?;

        let sources = format_sources(session.sources());
        let prompt = prompts::render(
            prompts::RESEARCHER,
            &[
                ("topic", session.topic()),
                ("strategy", session.strategy().unwrap_or_default()),
                ("sources", &sources),
            ],
        );
        let findings = self
            .generate(PipelineStage::Gathering, &prompt, temperature::FINDINGS, events)
            .await?;

        session.set_raw_findings(findings);
        log(session, events, "✓ Data collection complete").await?;
        let analyzed = session.sources().len();
        log(
            session,
            events,
            format!("  → Analyzed {} search results", analyzed),
        )
        .await
    }

    async fn analyze(&self, session: &mut Session, events: &mut EventStream) -> Result<(), StageError> {
        log(session, events, "📊 Analyst is processing findings...").await?;

        let prompt = prompts::render(
            prompts::ANALYST,
            &[("findings", session.raw_findings().unwrap_or_default())],
        );
        let insights = self
            .generate(PipelineStage::Analyzing, &prompt, temperature::INSIGHTS, events)
            .await?;

        session.set_insights(insights);
        log(session, events, "✓ Analysis complete").await
    }

    async fn visualize(&self, session: &mut Session, events: &mut EventStream) -> Result<(), StageError> {
        log(session, events, "📈 Generating visualization data...").await?;

        let insights = session.insights().unwrap_or_default();
        let extracted =
            until_closed(events, self.charts.try_extract(insights, session.topic())).await?;

        let charts = match extracted {
            Ok(set) => set.charts,
            Err(e) => {
                tracing::warn!(error = %e, "Chart extraction failed, continuing without charts");
                log(session, events, format!("  ⚠️ Visualizer warning: {}", e)).await?;
                Vec::new()
            }
        };
        let line = format!("  → Generated {} charts", charts.len());
        session.set_charts(charts);
        log(session, events, line).await
    }

    async fn synthesize(&self, session: &mut Session, events: &mut EventStream) -> Result<(), StageError> {
        log(session, events, "📄 Generating final report...").await?;

        let prompt = prompts::render(
            prompts::SYNTHESIZER,
            &[
                ("topic", session.topic()),
                ("insights", session.insights().unwrap_or_default()),
            ],
        );
        let report = self
            .generate(PipelineStage::Synthesizing, &prompt, temperature::REPORT, events)
            .await?;

        let report = match self.assembler.try_assemble(&report, session.charts()) {
            Ok(assembled) => assembled,
            Err(AssembleError::NothingToInject) => report,
            Err(e) => {
                tracing::warn!(error = %e, "Chart injection failed, keeping report as generated");
                log(session, events, format!("  ⚠️ Chart injection skipped: {}", e)).await?;
                report
            }
        };
        session.set_final_report(report);
        publish(session, events).await
    }

    /// One generation call, abandoned if the consumer disconnects
    async fn generate(
        &self,
        stage: PipelineStage,
        prompt: &str,
        temperature: f32,
        events: &EventStream,
    ) -> Result<String, StageError> {
        until_closed(events, self.llm.generate(prompt, temperature))
            .await?
            .map_err(|source| StageError::Generation { stage, source })
    }
}

/// Race `work` against the consumer going away
async fn until_closed<F: Future>(events: &EventStream, work: F) -> Result<F::Output, StageError> {
    tokio::select! {
        biased;
        _ = events.closed() => Err(StageError::Cancelled),
        out = work => Ok(out),
    }
}

async fn publish(session: &Session, events: &mut EventStream) -> Result<(), StageError> {
    events.emit(FrameKind::State, &session.snapshot()).await?;
    Ok(())
}

async fn log(
    session: &mut Session,
    events: &mut EventStream,
    line: impl Into<String>,
) -> Result<(), StageError> {
    session.log(line);
    publish(session, events).await
}

fn list_marker() -> Option<&'static Regex> {
    static MARKER: OnceLock<Option<Regex>> = OnceLock::new();
    MARKER
        .get_or_init(|| Regex::new(r"^(?:[-*•+]+|\d+[.)]|#+)\s*").ok())
        .as_ref()
}

/// Search queries from the extraction response, one per line.
///
/// List markers and surrounding quotes are stripped, blank lines dropped, at
/// most [`MAX_QUERIES`] kept. Falls back to the topic when nothing is left.
pub fn extract_queries(response: &str, topic: &str) -> Vec<String> {
    let mut queries: Vec<String> = response
        .lines()
        .map(str::trim)
        .map(|line| match list_marker() {
            Some(re) => re.replace(line, "").into_owned(),
            None => line.to_string(),
        })
        .map(|line| {
            line.trim()
                .trim_matches(|c| c == '"' || c == '\'' || c == '`')
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .take(MAX_QUERIES)
        .collect();

    if queries.is_empty() {
        queries.push(topic.trim().to_string());
    }
    queries
}

/// First [`MAX_SOURCES_FOR_FINDINGS`] sources as prompt text
pub fn format_sources(sources: &[SearchResult]) -> String {
    sources
        .iter()
        .take(MAX_SOURCES_FOR_FINDINGS)
        .enumerate()
        .map(|(i, r)| {
            format!(
                "Source {}: {}\nURL: {}\nDescription: {}",
                i + 1,
                r.title,
                r.url,
                r.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::swarm::events::Frame;
    use crate::tools::search::gateway::tests::{gateway, FakeProvider};
    use crate::tools::search::{ResearchDepth, SearchDepth, SearchError};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Replays canned responses in order and records every prompt
    pub(crate) struct ScriptedGenerator {
        script: Mutex<VecDeque<Result<String, String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub(crate) fn new(script: Vec<Result<String, String>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str, _temperature: f32) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.script.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(message)) => Err(GenerationError::Other(message)),
                None => Err(GenerationError::Other("script exhausted".to_string())),
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    /// Never answers
    struct StalledGenerator;

    #[async_trait]
    impl TextGenerator for StalledGenerator {
        async fn generate(&self, _prompt: &str, _temperature: f32) -> Result<String, GenerationError> {
            std::future::pending::<Result<String, GenerationError>>().await
        }

        fn model_name(&self) -> &str {
            "stalled"
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        stages: Mutex<Vec<(PipelineStage, bool)>>,
        searches: Mutex<usize>,
        sessions: Mutex<Vec<SessionStatus>>,
    }

    impl StageObserver for RecordingObserver {
        fn stage_finished(&self, stage: PipelineStage, _elapsed: Duration, success: bool) {
            self.stages.lock().unwrap().push((stage, success));
        }

        fn search_finished(&self, _query: &str, _origin: &SearchOrigin, _elapsed: Duration) {
            *self.searches.lock().unwrap() += 1;
        }

        fn session_finished(&self, status: SessionStatus, _elapsed: Duration) {
            self.sessions.lock().unwrap().push(status);
        }
    }

    const REPORT: &str = "# EV Market\n\n```json\n{\"title\": \"EV Market 2024\", \"key_metrics\": []}\n```\n\n## Executive Summary\nGrowth continues.\n";

    const CHARTS: &str = r#"{"charts": [{"type": "bar", "title": "Share", "data": [{"label": "BYD", "value": 35}]}]}"#;

    fn happy_script(queries: &str) -> Vec<Result<String, String>> {
        vec![
            Ok("1. Context\n2. Questions".to_string()),
            Ok(queries.to_string()),
            Ok("Findings about EVs".to_string()),
            Ok("Insights about EVs".to_string()),
            Ok(CHARTS.to_string()),
            Ok(REPORT.to_string()),
        ]
    }

    fn request(topic: &str, depth: u32) -> ValidatedRequest {
        ValidatedRequest {
            topic: topic.to_string(),
            depth: ResearchDepth(depth),
        }
    }

    async fn drain(mut rx: mpsc::Receiver<Frame>) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = rx.recv().await {
            frames.push(frame);
        }
        frames
    }

    /// Distinct `current_step` values of state frames, in order
    fn steps(frames: &[Frame]) -> Vec<String> {
        let mut steps: Vec<String> = Vec::new();
        for frame in frames.iter().filter(|f| f.kind == FrameKind::State) {
            let step = frame.data["current_step"].as_str().unwrap().to_string();
            if steps.last() != Some(&step) {
                steps.push(step);
            }
        }
        steps
    }

    async fn run_session(
        orchestrator: &Orchestrator,
        request: ValidatedRequest,
    ) -> (SessionOutcome, Vec<Frame>) {
        let (stream, rx) = EventStream::channel(256);
        let outcome = orchestrator.run(request, stream).await;
        (outcome, drain(rx).await)
    }

    #[test]
    fn test_extract_queries_cleans_lines() {
        let raw = "1. EV market size 2024\n\n- \"EV adoption rates\"\n* top EV makers\n2) battery costs\n`charging networks`\nsixth query";
        assert_eq!(
            extract_queries(raw, "EVs"),
            vec![
                "EV market size 2024",
                "EV adoption rates",
                "top EV makers",
                "battery costs",
                "charging networks",
            ]
        );
        assert_eq!(extract_queries(" \n - \n", "  EVs "), vec!["EVs"]);
    }

    #[test]
    fn test_format_sources_limits_to_fifteen() {
        let sources: Vec<SearchResult> = (0..20)
            .map(|i| SearchResult {
                title: format!("T{}", i),
                url: format!("https://s.test/{}", i),
                description: "D".to_string(),
            })
            .collect();
        let text = format_sources(&sources);
        assert!(text.starts_with("Source 1: T0\nURL: https://s.test/0\nDescription: D\n\nSource 2:"));
        assert!(text.contains("Source 15: T14"));
        assert!(!text.contains("Source 16:"));
    }

    #[tokio::test]
    async fn test_electric_vehicles_session_completes() {
        let llm = ScriptedGenerator::new(happy_script(
            "EV market size 2024\nEV sales growth\nEV battery prices\nEV charging\nEV makers\nEV policy\nEV exports",
        ));
        let primary = FakeProvider::ok("brave", 10);
        let secondary = FakeProvider::ok("tavily", 10);
        let search = Arc::new(gateway(primary.clone(), secondary.clone(), Duration::ZERO));
        let observer = Arc::new(RecordingObserver::default());
        let orchestrator = Orchestrator::new(llm.clone(), search).with_observer(observer.clone());

        let (outcome, frames) =
            run_session(&orchestrator, request("Electric vehicles market 2024", 1)).await;

        assert_eq!(primary.calls(), 5);
        assert_eq!(secondary.calls(), 0);
        assert_eq!(*observer.searches.lock().unwrap(), 5);

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 6);
        assert_eq!(prompts[2].matches("\nURL: ").count(), 15);

        let SessionOutcome::Completed(session) = outcome else {
            panic!("session did not complete");
        };
        assert_eq!(session.stage(), PipelineStage::Complete);
        assert_eq!(session.sources().len(), 15);
        assert_eq!(session.charts().len(), 1);
        let report = session.final_report().unwrap();
        assert!(!report.is_empty());
        assert!(report.contains("\"charts\""));
        assert!(report.ends_with("```\n\n## Executive Summary\nGrowth continues.\n"));

        let last = frames.last().unwrap();
        assert_eq!(last.kind, FrameKind::Complete);
        assert_eq!(last.data["status"], "success");
        assert_eq!(last.data["final_report"], report);
        assert_eq!(*observer.sessions.lock().unwrap(), vec![SessionStatus::Completed]);
    }

    #[tokio::test]
    async fn test_stage_order_and_single_terminal_frame() {
        let llm = ScriptedGenerator::new(happy_script("q1\nq2\nq3"));
        let search = Arc::new(gateway(
            FakeProvider::ok("brave", 3),
            FakeProvider::ok("tavily", 5),
            Duration::ZERO,
        ));
        let observer = Arc::new(RecordingObserver::default());
        let orchestrator = Orchestrator::new(llm, search).with_observer(observer.clone());

        let (_, frames) = run_session(&orchestrator, request("EVs", 1)).await;

        assert_eq!(
            steps(&frames),
            vec!["planning", "gathering", "analyzing", "visualizing", "synthesizing", "complete"]
        );
        let terminal: Vec<_> = frames.iter().filter(|f| f.kind.is_terminal()).collect();
        assert_eq!(terminal.len(), 1);
        assert!(frames.last().unwrap().kind.is_terminal());

        let stages: Vec<_> = observer.stages.lock().unwrap().clone();
        assert_eq!(stages.len(), 5);
        assert!(stages.iter().all(|(_, ok)| *ok));
    }

    #[tokio::test]
    async fn test_snapshots_never_carry_future_fields() {
        let llm = ScriptedGenerator::new(happy_script("q1"));
        let search = Arc::new(gateway(
            FakeProvider::ok("brave", 3),
            FakeProvider::ok("tavily", 5),
            Duration::ZERO,
        ));
        let orchestrator = Orchestrator::new(llm, search);

        let (_, frames) = run_session(&orchestrator, request("EVs", 1)).await;

        for frame in frames.iter().filter(|f| f.kind == FrameKind::State) {
            match frame.data["current_step"].as_str().unwrap() {
                "planning" => {
                    assert!(frame.data.get("sources").is_none());
                    assert!(frame.data.get("raw_data").is_none());
                }
                "gathering" | "analyzing" => {
                    assert!(frame.data.get("chart_data").is_none());
                    assert!(frame.data.get("final_report").is_none());
                }
                _ => {}
            }
        }
        let first = &frames[0];
        assert_eq!(first.data["logs"], serde_json::json!(["🚀 Research started..."]));
    }

    #[tokio::test]
    async fn test_analyzing_failure_emits_one_error_frame() {
        let llm = ScriptedGenerator::new(vec![
            Ok("plan".to_string()),
            Ok("q1\nq2".to_string()),
            Ok("findings".to_string()),
            Err("model overloaded".to_string()),
        ]);
        let search = Arc::new(gateway(
            FakeProvider::ok("brave", 3),
            FakeProvider::ok("tavily", 5),
            Duration::ZERO,
        ));
        let observer = Arc::new(RecordingObserver::default());
        let orchestrator = Orchestrator::new(llm, search).with_observer(observer.clone());

        let (outcome, frames) = run_session(&orchestrator, request("EVs", 1)).await;

        let SessionOutcome::Failed { session, error } = outcome else {
            panic!("session did not fail");
        };
        assert!(matches!(
            error,
            StageError::Generation {
                stage: PipelineStage::Analyzing,
                ..
            }
        ));
        assert_eq!(session.stage(), PipelineStage::Failed);

        let steps = steps(&frames);
        assert!(!steps.iter().any(|s| s == "visualizing" || s == "synthesizing"));

        let errors: Vec<_> = frames.iter().filter(|f| f.kind == FrameKind::Error).collect();
        assert_eq!(errors.len(), 1);
        assert!(frames.iter().all(|f| f.kind != FrameKind::Complete));
        assert_eq!(frames.last().unwrap().kind, FrameKind::Error);

        let payload = &errors[0].data;
        assert!(payload["error"].as_str().unwrap().contains("model overloaded"));
        let logs: Vec<&str> = payload["logs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l.as_str().unwrap())
            .collect();
        assert!(logs.contains(&"✓ Strategy complete"));
        assert!(logs.contains(&"✓ Data collection complete"));
        assert!(logs.last().unwrap().starts_with("❌ Error: "));

        assert_eq!(
            observer.stages.lock().unwrap().last(),
            Some(&(PipelineStage::Analyzing, false))
        );
        assert_eq!(*observer.sessions.lock().unwrap(), vec![SessionStatus::Failed]);
    }

    #[tokio::test]
    async fn test_planning_failure_stops_immediately() {
        let llm = ScriptedGenerator::new(vec![Err("no key".to_string())]);
        let primary = FakeProvider::ok("brave", 3);
        let search = Arc::new(gateway(primary.clone(), FakeProvider::ok("tavily", 5), Duration::ZERO));
        let orchestrator = Orchestrator::new(llm.clone(), search);

        let (outcome, frames) = run_session(&orchestrator, request("EVs", 1)).await;

        assert_eq!(outcome.status(), SessionStatus::Failed);
        assert_eq!(llm.prompts().len(), 1);
        assert_eq!(primary.calls(), 0);
        assert_eq!(frames.last().unwrap().kind, FrameKind::Error);
    }

    #[tokio::test]
    async fn test_degraded_searches_are_absorbed() {
        let llm = ScriptedGenerator::new(happy_script("q1\nq2"));
        let search = Arc::new(gateway(
            FakeProvider::failing("brave", SearchError::Unauthorized),
            FakeProvider::ok("tavily", 5),
            Duration::ZERO,
        ));
        let orchestrator = Orchestrator::new(llm.clone(), search);

        let (outcome, _) = run_session(&orchestrator, request("EVs", 1)).await;

        let SessionOutcome::Completed(session) = outcome else {
            panic!("degraded search must not fail the session");
        };
        assert!(!session.sources().is_empty());
        assert!(session
            .logs()
            .iter()
            .any(|l| l == "  ⚠️ Search 1 warning: Using fallback data"));
        assert!(llm.prompts()[2].contains("Source 1: "));
    }

    #[tokio::test]
    async fn test_deep_research_uses_secondary_provider() {
        let llm = ScriptedGenerator::new(happy_script("q1\nq2\nq3\nq4"));
        let primary = FakeProvider::ok("brave", 10);
        let secondary = FakeProvider::ok("tavily", 10);
        let search = Arc::new(gateway(primary.clone(), secondary.clone(), Duration::ZERO));
        let orchestrator = Orchestrator::new(llm.clone(), search);

        let (outcome, _) = run_session(&orchestrator, request("EVs", 3)).await;

        assert_eq!(primary.calls(), 0);
        assert_eq!(secondary.calls(), 4);
        assert!(secondary
            .modes
            .lock()
            .unwrap()
            .iter()
            .all(|m| *m == SearchDepth::Advanced));
        assert_eq!(outcome.session().sources().len(), 20);
        assert_eq!(llm.prompts()[2].matches("\nURL: ").count(), 15);
    }

    #[tokio::test]
    async fn test_bad_chart_output_still_completes() {
        let mut script = happy_script("q1");
        script[4] = Ok("I could not find any numbers.".to_string());
        let llm = ScriptedGenerator::new(script);
        let search = Arc::new(gateway(
            FakeProvider::ok("brave", 3),
            FakeProvider::ok("tavily", 5),
            Duration::ZERO,
        ));
        let orchestrator = Orchestrator::new(llm, search);

        let (outcome, _) = run_session(&orchestrator, request("EVs", 1)).await;

        let SessionOutcome::Completed(session) = outcome else {
            panic!("chart failure must not fail the session");
        };
        assert!(session.charts().is_empty());
        assert_eq!(session.final_report(), Some(REPORT));
        assert!(session.logs().iter().any(|l| l == "  → Generated 0 charts"));
    }

    /// Each log line must have been the newest line of some state frame
    fn assert_every_line_published(session: &Session, frames: &[Frame]) {
        let published: Vec<&str> = frames
            .iter()
            .filter(|f| f.kind == FrameKind::State)
            .filter_map(|f| f.data["logs"].as_array()?.last()?.as_str())
            .collect();
        for line in session.logs() {
            assert!(
                published.contains(&line.as_str()),
                "log line never published on its own: {:?}",
                line
            );
        }
    }

    #[tokio::test]
    async fn test_warning_lines_each_get_a_state_frame() {
        let mut script = happy_script("q1\nq2");
        script[4] = Ok("no charts today".to_string());
        let llm = ScriptedGenerator::new(script);
        let search = Arc::new(gateway(
            FakeProvider::failing("brave", SearchError::Unauthorized),
            FakeProvider::ok("tavily", 5),
            Duration::ZERO,
        ));
        let orchestrator = Orchestrator::new(llm, search);

        let (outcome, frames) = run_session(&orchestrator, request("EVs", 1)).await;

        let session = outcome.session();
        assert!(session
            .logs()
            .iter()
            .any(|l| l == "  ⚠️ Search 2 warning: Using fallback data"));
        assert!(session
            .logs()
            .iter()
            .any(|l| l.starts_with("  ⚠️ Visualizer warning:")));
        assert_every_line_published(session, &frames);
    }

    #[tokio::test]
    async fn test_skipped_injection_line_gets_a_state_frame() {
        let mut script = happy_script("q1");
        script[5] = Ok("# EV Market\n\nNo fragment here.".to_string());
        let llm = ScriptedGenerator::new(script);
        let search = Arc::new(gateway(
            FakeProvider::ok("brave", 3),
            FakeProvider::ok("tavily", 5),
            Duration::ZERO,
        ));
        let orchestrator = Orchestrator::new(llm, search);

        let (outcome, frames) = run_session(&orchestrator, request("EVs", 1)).await;

        let SessionOutcome::Completed(session) = &outcome else {
            panic!("injection failure must not fail the session");
        };
        assert!(session
            .logs()
            .iter()
            .any(|l| l.starts_with("  ⚠️ Chart injection skipped:")));
        assert_eq!(session.final_report(), Some("# EV Market\n\nNo fragment here."));
        assert_every_line_published(session, &frames);
    }

    #[tokio::test]
    async fn test_disconnect_during_generation_cancels() {
        let search = Arc::new(gateway(
            FakeProvider::ok("brave", 3),
            FakeProvider::ok("tavily", 5),
            Duration::ZERO,
        ));
        let observer = Arc::new(RecordingObserver::default());
        let orchestrator =
            Orchestrator::new(Arc::new(StalledGenerator), search).with_observer(observer.clone());
        let (stream, mut rx) = EventStream::channel(16);

        let consumer = async move {
            rx.recv().await;
            rx.recv().await;
            drop(rx);
        };
        let (outcome, ()) = tokio::join!(orchestrator.run(request("EVs", 1), stream), consumer);

        let SessionOutcome::Cancelled(session) = outcome else {
            panic!("session should be cancelled");
        };
        assert!(session.strategy().is_none());
        assert_eq!(*observer.sessions.lock().unwrap(), vec![SessionStatus::Cancelled]);
    }

    #[tokio::test]
    async fn test_closed_stream_before_start() {
        let llm = ScriptedGenerator::new(happy_script("q1"));
        let search = Arc::new(gateway(
            FakeProvider::ok("brave", 3),
            FakeProvider::ok("tavily", 5),
            Duration::ZERO,
        ));
        let orchestrator = Orchestrator::new(llm.clone(), search);
        let (stream, rx) = EventStream::channel(4);
        drop(rx);

        let outcome = orchestrator.run(request("EVs", 1), stream).await;

        assert_eq!(outcome.status(), SessionStatus::Cancelled);
        assert!(llm.prompts().is_empty());
    }
}
