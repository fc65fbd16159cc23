//! # Chart Skill
//!
//! Derives chart specifications from free-text insights with one generation
//! call. Parsing is lenient: a fenced JSON block is preferred, the whole
//! response is tried otherwise. A payload without a `charts` list yields no
//! charts, while a single malformed chart or data point is skipped on its own.

use crate::models::{GenerationError, TextGenerator};
use crate::skills::prompts::{self, temperature};
use crate::tools::fence::{self, FenceError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Kind of chart to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Pie,
    Area,
    #[serde(other)]
    Other,
}

/// One labelled value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    #[serde(deserialize_with = "label_from_any")]
    pub label: String,
    #[serde(deserialize_with = "value_from_any")]
    pub value: f64,
}

/// A chart the frontend can render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(rename = "data", default)]
    pub data_points: Vec<DataPoint>,
    #[serde(rename = "xAxisKey", default = "default_x_key")]
    pub x_key: String,
    #[serde(rename = "dataKey", default = "default_y_key")]
    pub y_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

fn default_x_key() -> String {
    "label".to_string()
}

fn default_y_key() -> String {
    "value".to_string()
}

/// The `{"charts": [...]}` document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartSet {
    pub charts: Vec<ChartSpec>,
}

/// Labels sometimes arrive as bare years
fn label_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string label, got {}",
            other
        ))),
    }
}

/// Values sometimes arrive as strings like "35" or "5.2%"
fn value_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("number out of range")),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-'))
                .collect();
            cleaned
                .parse::<f64>()
                .map_err(|_| serde::de::Error::custom(format!("not a number: {:?}", s)))
        }
        other => Err(serde::de::Error::custom(format!(
            "expected a numeric value, got {}",
            other
        ))),
    }
}

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("chart generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("chart payload is not JSON: {0}")]
    Parse(#[from] FenceError),
    #[error("chart payload has the wrong shape: {0}")]
    Shape(#[from] serde_json::Error),
}

/// `charts` before the individual entries are checked
#[derive(Deserialize)]
struct RawChartSet {
    charts: Vec<Value>,
}

/// Parse a model response into charts
pub fn parse_charts(response: &str) -> Result<ChartSet, ChartError> {
    let value = fence::parse_json_payload(response)?;
    let raw: RawChartSet = serde_json::from_value(value)?;
    let charts = raw
        .charts
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| chart_from_value(index, entry))
        .collect();
    Ok(ChartSet { charts })
}

fn chart_from_value(index: usize, mut entry: Value) -> Option<ChartSpec> {
    if let Some(points) = entry.get_mut("data").and_then(Value::as_array_mut) {
        points.retain(|point| match DataPoint::deserialize(point) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(chart = index, error = %e, "Dropping malformed data point");
                false
            }
        });
    }
    match serde_json::from_value(entry) {
        Ok(chart) => Some(chart),
        Err(e) => {
            tracing::warn!(chart = index, error = %e, "Skipping malformed chart");
            None
        }
    }
}

/// Extracts chart specifications from insights
#[derive(Clone)]
pub struct ChartExtractor {
    llm: Arc<dyn TextGenerator>,
}

impl ChartExtractor {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    /// One generation call, no retry
    pub async fn try_extract(&self, insights: &str, topic: &str) -> Result<ChartSet, ChartError> {
        let prompt = prompts::render(prompts::CHART, &[("topic", topic), ("insights", insights)]);
        let response = self.llm.generate(&prompt, temperature::CHARTS).await?;
        parse_charts(&response)
    }

    /// Never fails; any problem yields an empty chart list
    pub async fn extract(&self, insights: &str, topic: &str) -> ChartSet {
        match self.try_extract(insights, topic).await {
            Ok(set) => set,
            Err(e) => {
                tracing::warn!(error = %e, "Chart extraction failed, using empty chart list");
                ChartSet::default()
            }
        }
    }
}
