//! # Session State
//!
//! In-memory state for a single research session. Nothing here outlives the
//! stream that created it.

pub mod request;
pub mod session;

pub use request::{ResearchRequest, ValidatedRequest, ValidationError, MAX_TOPIC_CHARS};
pub use session::{Session, SessionSnapshot};
