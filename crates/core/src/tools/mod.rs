//! # Research Tools
//!
//! External lookups used by the research pipeline, plus the parsing helpers
//! they share.
//!
//! ## Modules
//!
//! - `search` - Cached, rate-limited web search with deterministic fallback
//! - `fetch` - Bounded document retrieval and main-content extraction
//! - `fence` - Fenced JSON block locator shared by chart and report handling

pub mod fence;
pub mod fetch;
pub mod search;

pub use fetch::{DocumentFetcher, FetchError, FetchOutcome};
pub use search::{ResearchDepth, SearchBatch, SearchGateway, SearchOrigin, SearchResult};
