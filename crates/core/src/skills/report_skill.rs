//! # Report Skill
//!
//! Splices chart specifications into the JSON block embedded in a generated
//! report. Only the fenced block changes; narrative text before and after it
//! is kept byte-for-byte, and any failure leaves the report untouched.

use crate::skills::chart_skill::ChartSpec;
use crate::tools::fence::{self, FenceError};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("no chart data to inject")]
    NothingToInject,
    #[error(transparent)]
    Fragment(#[from] FenceError),
    #[error("report fragment is not a JSON object")]
    NotAnObject,
    #[error("failed to serialize fragment: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Merges charts into a report's embedded JSON fragment
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportAssembler;

impl ReportAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Inject `charts` under the fragment's `charts` key.
    ///
    /// An existing `charts` entry is replaced.
    pub fn try_assemble(&self, report: &str, charts: &[ChartSpec]) -> Result<String, AssembleError> {
        if charts.is_empty() {
            return Err(AssembleError::NothingToInject);
        }

        let (block, mut fragment) = fence::parse_fenced_json(report)?;
        let object = fragment.as_object_mut().ok_or(AssembleError::NotAnObject)?;
        object.insert("charts".to_string(), serde_json::to_value(charts)?);
        let rendered = serde_json::to_string_pretty(&fragment)?;

        let body_span = block.body_span.clone();
        let mut out = String::with_capacity(report.len() + rendered.len());
        out.push_str(&report[..body_span.start]);
        out.push('\n');
        out.push_str(&rendered);
        out.push('\n');
        out.push_str(&report[body_span.end..]);
        Ok(out)
    }

    /// Never fails; on any problem the report comes back unmodified
    pub fn assemble(&self, report: &str, charts: &[ChartSpec]) -> String {
        match self.try_assemble(report, charts) {
            Ok(assembled) => assembled,
            Err(AssembleError::NothingToInject) => report.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Chart injection skipped");
                report.to_string()
            }
        }
    }
}

/// Pull the parsed JSON fragment back out of a report
pub fn report_fragment(report: &str) -> Option<Value> {
    fence::parse_fenced_json(report).ok().map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::chart_skill::{ChartKind, DataPoint};

    fn charts() -> Vec<ChartSpec> {
        vec![ChartSpec {
            kind: ChartKind::Bar,
            title: "Share by Maker".to_string(),
            subtitle: Some("2024, percent".to_string()),
            data_points: vec![
                DataPoint {
                    label: "BYD".to_string(),
                    value: 35.0,
                },
                DataPoint {
                    label: "Tesla".to_string(),
                    value: 20.5,
                },
            ],
            x_key: "label".to_string(),
            y_key: "value".to_string(),
            color: None,
        }]
    }

    const PREFIX: &str = "# EV Market 2024\n\nIntro paragraph with `code` and ünïcode.\n\n";
    const SUFFIX: &str = "\n\n## Summary\n\nNarrative ```not a fence start``` continues.\n";

    fn report_with(fragment: &str) -> String {
        format!("{}```json\n{}\n```{}", PREFIX, fragment, SUFFIX)
    }

    #[test]
    fn test_injects_and_preserves_narrative() {
        let report = report_with(r#"{"title": "EVs", "key_metrics": []}"#);
        let assembled = ReportAssembler::new().assemble(&report, &charts());

        assert!(assembled.starts_with(&format!("{}```json", PREFIX)));
        assert!(assembled.ends_with(&format!("```{}", SUFFIX)));

        let fragment = report_fragment(&assembled).unwrap();
        assert_eq!(fragment["title"], "EVs");
        let round_trip: Vec<ChartSpec> =
            serde_json::from_value(fragment["charts"].clone()).unwrap();
        assert_eq!(round_trip, charts());
    }

    #[test]
    fn test_no_fragment_leaves_report_unmodified() {
        let report = "Just prose, no structured block.";
        assert_eq!(ReportAssembler::new().assemble(report, &charts()), report);
    }

    #[test]
    fn test_invalid_fragment_leaves_report_unmodified() {
        let report = report_with("{ not json");
        assert_eq!(ReportAssembler::new().assemble(&report, &charts()), report);

        let report = report_with("[1, 2, 3]");
        assert!(matches!(
            ReportAssembler::new().try_assemble(&report, &charts()),
            Err(AssembleError::NotAnObject)
        ));
    }

    #[test]
    fn test_empty_charts_leave_report_unmodified() {
        let report = report_with(r#"{"title": "EVs"}"#);
        assert_eq!(ReportAssembler::new().assemble(&report, &[]), report);
    }

    #[test]
    fn test_existing_charts_are_replaced() {
        let report = report_with(r#"{"charts": [{"stale": true}]}"#);
        let assembled = ReportAssembler::new().assemble(&report, &charts());
        let fragment = report_fragment(&assembled).unwrap();
        assert_eq!(fragment["charts"][0]["title"], "Share by Maker");
    }
}
