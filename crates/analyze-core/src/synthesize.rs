//! Turns raw analyzer output into a normalized, length-capped job result.

use crate::domain::{ExecutionOutcome, JobResult};
use serde_json::Value;

/// Summary used for every analyzer that ended abnormally.
pub const INTERNAL_FAILURE: &str = "internal_failure";

/// Appended to summaries cut at the length cap.
pub const TRUNCATION_SUFFIX: &str = "...";

/// Shape of captured analyzer output.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedOutput {
    /// Parsed, and carries a textual `summary` field.
    WithSummary { summary: String, data: Value },
    /// Parsed, but no textual `summary` field.
    WithoutSummary(Value),
    /// Not parseable as structured data.
    Unparsed,
}

impl ParsedOutput {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(data) => match data.get("summary").and_then(Value::as_str) {
                Some(summary) => ParsedOutput::WithSummary {
                    summary: summary.to_string(),
                    data,
                },
                None => ParsedOutput::WithoutSummary(data),
            },
            Err(_) => ParsedOutput::Unparsed,
        }
    }
}

/// Cut `text` to `limit` characters, marking the cut with [`TRUNCATION_SUFFIX`].
pub fn truncate_summary(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_SUFFIX),
        None => text.to_string(),
    }
}

/// Build the job result for one analyzer outcome. Never fails.
pub fn synthesize(outcome: &ExecutionOutcome, summary_length: usize) -> JobResult {
    if outcome.terminal_error.is_some() {
        return JobResult {
            id: outcome.analyzer_id.clone(),
            summary: INTERNAL_FAILURE.to_string(),
            data: Value::Null,
        };
    }

    let raw = String::from_utf8_lossy(&outcome.output);
    let (candidate, data) = match ParsedOutput::parse(&raw) {
        ParsedOutput::WithSummary { summary, data } => (summary, data),
        ParsedOutput::WithoutSummary(data) => (raw.to_string(), data),
        ParsedOutput::Unparsed => (raw.to_string(), Value::String(raw.to_string())),
    };

    JobResult {
        id: outcome.analyzer_id.clone(),
        summary: truncate_summary(&candidate, summary_length),
        data,
    }
}
