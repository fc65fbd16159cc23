//! # Fenced Blocks
//!
//! Locates the first fenced structured block inside free text.
//!
//! Chart extraction and report assembly share this one contract: find the
//! first recognized fence marker pair (```` ```json ```` preferred, bare
//! ```` ``` ```` otherwise), hand back the enclosed span, and do nothing on
//! any failure.

use serde_json::Value;
use std::ops::Range;
use thiserror::Error;

const FENCE: &str = "```";
const JSON_FENCE: &str = "```json";

/// A fenced block found inside a larger text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    /// Info string after the opening marker (`json`, `python`, ...)
    pub lang: Option<&'a str>,
    /// Raw content between the markers
    pub body: &'a str,
    /// Byte range of the whole block, markers included
    pub span: Range<usize>,
    /// Byte range of `body` within the source text
    pub body_span: Range<usize>,
}

#[derive(Debug, Error)]
pub enum FenceError {
    #[error("no fenced block found")]
    NotFound,
    #[error("invalid JSON payload: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Find the first ```` ```json ```` block, else the first bare fenced block
pub fn find_json_block(text: &str) -> Option<FencedBlock<'_>> {
    find_block(text, JSON_FENCE).or_else(|| find_block(text, FENCE))
}

fn find_block<'a>(text: &'a str, marker: &str) -> Option<FencedBlock<'a>> {
    let start = text.find(marker)?;
    let after_marker = start + marker.len();

    // A bare fence may carry an info string up to the end of its line
    let (lang, body_start) = if marker == FENCE {
        match text[after_marker..].find('\n') {
            Some(nl) => {
                let info = text[after_marker..after_marker + nl].trim();
                let lang = (!info.is_empty()).then_some(info);
                (lang, after_marker + nl + 1)
            }
            None => (None, after_marker),
        }
    } else {
        (Some(&text[start + FENCE.len()..after_marker]), after_marker)
    };

    let body_end = body_start + text[body_start..].find(FENCE)?;
    Some(FencedBlock {
        lang,
        body: &text[body_start..body_end],
        span: start..body_end + FENCE.len(),
        body_span: body_start..body_end,
    })
}

/// Parse a JSON payload from a response that may or may not be fenced.
///
/// The fenced body wins when present; otherwise the whole text is parsed.
pub fn parse_json_payload(text: &str) -> Result<Value, FenceError> {
    let payload = match find_json_block(text) {
        Some(block) => block.body.trim(),
        None => text.trim(),
    };
    Ok(serde_json::from_str(payload)?)
}

/// Parse the first fenced JSON block; absence is an error
pub fn parse_fenced_json(text: &str) -> Result<(FencedBlock<'_>, Value), FenceError> {
    let block = find_json_block(text).ok_or(FenceError::NotFound)?;
    let value = serde_json::from_str(block.body.trim())?;
    Ok((block, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_json_fence() {
        let text = "```text\nhello\n```\n```json\n{\"a\": 1}\n```";
        let block = find_json_block(text).unwrap();
        assert_eq!(block.lang, Some("json"));
        assert_eq!(block.body.trim(), "{\"a\": 1}");
        assert_eq!(&text[block.span.clone()], "```json\n{\"a\": 1}\n```");
    }

    #[test]
    fn test_bare_fence_with_info_string() {
        let text = "intro\n```javascript\n{\"b\": 2}\n```\noutro";
        let block = find_json_block(text).unwrap();
        assert_eq!(block.lang, Some("javascript"));
        assert_eq!(block.body, "{\"b\": 2}\n");
        assert_eq!(&text[block.body_span.clone()], block.body);
    }

    #[test]
    fn test_unterminated_fence_is_ignored() {
        assert!(find_json_block("```json\n{\"a\": 1}").is_none());
        assert!(find_json_block("no fences at all").is_none());
    }

    #[test]
    fn test_parse_payload_fenced_or_bare() {
        let fenced = parse_json_payload("Sure!\n```json\n{\"charts\": []}\n```").unwrap();
        assert_eq!(fenced["charts"], serde_json::json!([]));

        let bare = parse_json_payload("  {\"charts\": [1]}  ").unwrap();
        assert_eq!(bare["charts"][0], 1);

        assert!(parse_json_payload("not json").is_err());
    }

    #[test]
    fn test_parse_fenced_requires_block() {
        assert!(matches!(
            parse_fenced_json("{\"a\": 1}"),
            Err(FenceError::NotFound)
        ));
        let (block, value) = parse_fenced_json("x ```json {\"a\": 1} ``` y").unwrap();
        assert_eq!(value["a"], 1);
        assert_eq!(block.span, 2..22);
    }
}
