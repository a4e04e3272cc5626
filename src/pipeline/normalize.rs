//! Agent output normalization
//!
//! Turns an agent history into the payload written to the result column.
//! The priority order and the sentinel strings below are part of the data
//! contract: rows written by earlier runs use the same values.

use crate::agent::AgentHistory;
use crate::core::AttemptResult;

pub const COMPLETED_WITHOUT_RESULT: &str = "Task completed but no result extracted";
pub const FOUND_BUT_EXTRACTION_FAILED: &str = "Mutual connections found but extraction failed";
pub const NO_MUTUAL_CONNECTIONS: &str = "No mutual connections found";
pub const EMPTY_RESULT: &str = "Empty result returned from automation";
pub const TIMEOUT: &str = "Timeout";

/// What the history alone tells us
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A payload was resolved
    Payload(String),
    /// No text, and the agent did not report success: check the live page
    NeedsPageCheck,
}

/// First non-empty text among: the final result, the most recent `done`
/// result, the most recent extracted fragment.
pub fn resolve_text(history: &AgentHistory) -> Option<String> {
    let non_empty = |s: &&str| !s.trim().is_empty();

    history
        .final_result()
        .filter(non_empty)
        .or_else(|| {
            history
                .done_results()
                .filter_map(|r| r.extracted_content.as_deref())
                .find(non_empty)
        })
        .or_else(|| {
            history
                .extracted_content()
                .into_iter()
                .rev()
                .find(non_empty)
        })
        .map(|s| s.trim().to_string())
}

/// Map resolved text onto its stored form
pub fn refine_text(text: &str) -> String {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();
    if lower == "none" || lower == "null" {
        EMPTY_RESULT.to_string()
    } else if lower.contains("no mutual connections found") {
        NO_MUTUAL_CONNECTIONS.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Resolve a history into a payload, or ask for the page fallback
pub fn normalize(history: &AgentHistory) -> Resolution {
    if let Some(text) = resolve_text(history) {
        return Resolution::Payload(refine_text(&text));
    }
    if history.is_successful() == Some(true) {
        return Resolution::Payload(COMPLETED_WITHOUT_RESULT.to_string());
    }
    Resolution::NeedsPageCheck
}

/// Last-resort classification from the rendered page text
pub fn classify_page_text(page_text: &str, keyword: &str) -> String {
    if page_text.to_lowercase().contains(&keyword.to_lowercase()) {
        FOUND_BUT_EXTRACTION_FAILED.to_string()
    } else {
        NO_MUTUAL_CONNECTIONS.to_string()
    }
}

/// Failed attempt caused by a transport-level error
pub fn error_result(detail: impl std::fmt::Display) -> AttemptResult {
    let detail = detail.to_string();
    AttemptResult::failed(format!("Error: {}", detail), detail)
}
