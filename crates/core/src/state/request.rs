//! Research request validation.
//!
//! Runs before any pipeline work: a request that fails here never starts a
//! session.

use crate::tools::search::ResearchDepth;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest accepted topic, in characters after trimming
pub const MAX_TOPIC_CHARS: usize = 500;

/// Incoming research request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub topic: String,
    #[serde(default = "default_depth")]
    pub research_depth: i64,
}

fn default_depth() -> i64 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Topic is required")]
    EmptyTopic,
    #[error("Topic must be at most {max} characters (got {actual})")]
    TopicTooLong { max: usize, actual: usize },
}

/// A request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub topic: String,
    pub depth: ResearchDepth,
}

impl ResearchRequest {
    pub fn new(topic: impl Into<String>, research_depth: i64) -> Self {
        Self {
            topic: topic.into(),
            research_depth,
        }
    }

    pub fn validate(&self) -> Result<ValidatedRequest, ValidationError> {
        let topic = self.topic.trim();
        if topic.is_empty() {
            return Err(ValidationError::EmptyTopic);
        }
        let chars = topic.chars().count();
        if chars > MAX_TOPIC_CHARS {
            return Err(ValidationError::TopicTooLong {
                max: MAX_TOPIC_CHARS,
                actual: chars,
            });
        }
        // Anything below 1 is treated as the shallowest depth
        let depth = u32::try_from(self.research_depth.max(1)).unwrap_or(u32::MAX);
        Ok(ValidatedRequest {
            topic: topic.to_string(),
            depth: ResearchDepth(depth),
        })
    }
}
