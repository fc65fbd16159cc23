//! # Analyst Skills
//!
//! Generation-backed helpers used by the pipeline's later stages.
//!
//! - `ChartExtractor` - Structured chart specifications from insights
//! - `ReportAssembler` - Splices charts into the report's JSON fragment
//! - `prompts` - Prompt templates for every stage

pub mod chart_skill;
pub mod prompts;
pub mod report_skill;

pub use chart_skill::{ChartExtractor, ChartKind, ChartSet, ChartSpec, DataPoint};
pub use report_skill::ReportAssembler;
