//! Market Analyst Server
//!
//! Axum server that streams research sessions over SSE, plus a CLI mode that
//! runs one session and prints its frames.

mod api;

use analyst_core::config::AnalystConfig;
use analyst_core::models::LlmClient;
use analyst_core::state::ResearchRequest;
use analyst_core::swarm::{EventStream, Orchestrator, SessionOutcome};
use analyst_core::tools::{DocumentFetcher, SearchGateway};
use anyhow::Context;
use api::AppState;
use clap::{Parser, Subcommand};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "analyst", about = "Market research pipeline with streaming progress")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the HTTP server (default)
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one research session and print its frames (CLI mode, no server)
    Run {
        /// The research topic
        topic: String,
        /// 1 = standard, 2 = deep, 3+ = deep with advanced search
        #[arg(short, long, default_value = "1")]
        depth: i64,
    },
}

fn build_state(config: AnalystConfig) -> anyhow::Result<AppState> {
    let llm = LlmClient::from_config(config.llm.clone()).context("Failed to build LLM client")?;
    let search =
        SearchGateway::from_config(&config.search).context("Failed to build search gateway")?;
    let fetcher =
        DocumentFetcher::new(config.fetch.clone()).context("Failed to build document fetcher")?;

    Ok(AppState {
        orchestrator: Arc::new(Orchestrator::new(Arc::new(llm), Arc::new(search))),
        fetcher: Arc::new(fetcher),
        config: Arc::new(config),
    })
}

async fn run_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let model = state.orchestrator.model_name().to_string();
    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Market Analyst running at http://{}", addr);
    println!("   Model:    {}", model);
    println!("   Research: POST /research (SSE)");
    println!("   Tools:    /api/v1/fetch, /api/v1/search/cache");
    println!("   OpenAPI:  /api/v1/openapi.json");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_once(state: AppState, topic: String, depth: i64) -> anyhow::Result<()> {
    let request = ResearchRequest::new(topic, depth).validate()?;
    let (events, mut frames) = EventStream::channel(32);

    let orchestrator = state.orchestrator.clone();
    let session = tokio::spawn(async move { orchestrator.run(request, events).await });

    while let Some(frame) = frames.recv().await {
        print!("{}", frame.to_sse());
    }

    match session.await? {
        SessionOutcome::Completed(_) => Ok(()),
        SessionOutcome::Failed { error, .. } => Err(error.into()),
        SessionOutcome::Cancelled(_) => anyhow::bail!("session was cancelled"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AnalystConfig::from_env();
    for warning in config.warnings() {
        tracing::warn!("{}", warning);
    }

    let default_port = config.server.port;
    let state = build_state(config)?;

    match args.command {
        Some(CliCommand::Run { topic, depth }) => run_once(state, topic, depth).await,
        Some(CliCommand::Serve { port }) => run_server(state, port.unwrap_or(default_port)).await,
        None => run_server(state, default_port).await,
    }
}
