//! # Research Pipeline
//!
//! Stage state machine, event stream and the orchestrator that drives them.
//!
//! ## Pipeline Flow
//!
//! ```text
//! Topic → Strategist → Query Extractor → Search × N → Researcher → Analyst → Charts → Synthesizer
//! ```

pub mod events;
pub mod observer;
pub mod orchestrator;
pub mod pipeline;

pub use events::{CompletePayload, ErrorPayload, EventStream, Frame, FrameKind, StreamError};
pub use observer::{SessionStatus, StageObserver, TracingObserver};
pub use orchestrator::{Orchestrator, SessionOutcome, StageError};
pub use pipeline::{Pipeline, PipelineStage};
