//! Prompt templates bundled at compile time.
//!
//! Templates use `{{name}}` placeholders filled by [`render`].

/// Strategist - turns a topic into a research plan
pub const STRATEGIST: &str = include_str!("defaults/strategist.md");

/// Query extractor - pulls search queries out of the plan
pub const QUERY_EXTRACTOR: &str = include_str!("defaults/query_extractor.md");

/// Researcher - synthesizes search results into findings
pub const RESEARCHER: &str = include_str!("defaults/researcher.md");

/// Analyst - derives insights from findings
pub const ANALYST: &str = include_str!("defaults/analyst.md");

/// Chart extractor - structured chart JSON from insights
pub const CHART: &str = include_str!("defaults/chart.md");

/// Synthesizer - final report with an embedded JSON block
pub const SYNTHESIZER: &str = include_str!("defaults/synthesizer.md");

/// Sampling temperature for each call
pub mod temperature {
    pub const STRATEGY: f32 = 0.7;
    pub const QUERIES: f32 = 0.3;
    pub const FINDINGS: f32 = 0.6;
    pub const INSIGHTS: f32 = 0.5;
    pub const CHARTS: f32 = 0.1;
    pub const REPORT: f32 = 0.4;
}

/// All templates with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("strategist", STRATEGIST),
        ("query_extractor", QUERY_EXTRACTOR),
        ("researcher", RESEARCHER),
        ("analyst", ANALYST),
        ("chart", CHART),
        ("synthesizer", SYNTHESIZER),
    ]
}

/// Substitute `{{key}}` placeholders.
///
/// Values are inserted in a single pass, so text inside a value that looks
/// like a placeholder is left alone.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find("}}") {
            Some(close) => {
                let name = after[..close].trim();
                match vars.iter().find(|(key, _)| *key == name) {
                    Some((_, value)) => out.push_str(value),
                    None => out.push_str(&rest[open..open + 2 + close + 2]),
                }
                rest = &after[close + 2..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
