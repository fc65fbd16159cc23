//! # Pipeline Stages
//!
//! Defines the stages of the research pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of the pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Session created, nothing run yet
    #[default]
    Idle,
    /// Strategist producing the research plan
    Planning,
    /// Query extraction, searches and findings
    Gathering,
    /// Analyst deriving insights
    Analyzing,
    /// Chart extraction
    Visualizing,
    /// Final report
    Synthesizing,
    /// Complete
    Complete,
    /// Failed
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Planning => "planning",
            PipelineStage::Gathering => "gathering",
            PipelineStage::Analyzing => "analyzing",
            PipelineStage::Visualizing => "visualizing",
            PipelineStage::Synthesizing => "synthesizing",
            PipelineStage::Complete => "complete",
            PipelineStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Complete | PipelineStage::Failed)
    }

    fn next(&self) -> Self {
        match self {
            PipelineStage::Idle => PipelineStage::Planning,
            PipelineStage::Planning => PipelineStage::Gathering,
            PipelineStage::Gathering => PipelineStage::Analyzing,
            PipelineStage::Analyzing => PipelineStage::Visualizing,
            PipelineStage::Visualizing => PipelineStage::Synthesizing,
            PipelineStage::Synthesizing => PipelineStage::Complete,
            PipelineStage::Complete => PipelineStage::Complete,
            PipelineStage::Failed => PipelineStage::Failed,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pipeline state machine
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    /// Current stage
    pub stage: PipelineStage,
}

impl Pipeline {
    /// Create a new pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to the next stage. Terminal stages stay put.
    pub fn advance(&mut self) {
        self.stage = self.stage.next();
    }

    /// Fail the pipeline. A completed pipeline cannot fail afterwards.
    pub fn fail(&mut self) {
        if !self.stage.is_terminal() {
            self.stage = PipelineStage::Failed;
        }
    }

    /// Check if pipeline is complete
    pub fn is_complete(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Check if pipeline succeeded
    pub fn is_success(&self) -> bool {
        self.stage == PipelineStage::Complete
    }
}
