//! # Analyst Core
//!
//! The research engine behind the Market Analyst service: turns a free-text
//! topic into a structured report by driving a fixed sequence of text
//! generation calls and web lookups, streaming progress as it goes.
//!
//! ## Architecture
//!
//! - `models` - Text generation providers and the `TextGenerator` seam
//! - `config` - Environment-driven configuration
//! - `tools/` - Search gateway, document fetcher, fenced-JSON parsing
//! - `skills/` - Chart extraction, report assembly, prompt templates
//! - `state/` - Session data model and request validation
//! - `swarm/` - Pipeline state machine, event stream, orchestrator
//!
//! ## Usage
//!
//! ```rust,ignore
//! use analyst_core::swarm::{EventStream, Orchestrator};
//!
//! let (events, mut frames) = EventStream::channel(32);
//! tokio::spawn(async move { orchestrator.run(request, events).await });
//! while let Some(frame) = frames.recv().await {
//!     print!("{}", frame.to_sse());
//! }
//! ```

pub mod config;
pub mod models;
pub mod skills;
pub mod state;
pub mod swarm;
pub mod tools;
