//! Agent run history
//!
//! Every executed step records one result per tool call. The history is the
//! only thing the task executor sees of an agent run.

use serde::{Deserialize, Serialize};

/// Outcome of one tool call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Text the action extracted from the page, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_content: Option<String>,
    /// Whether this action declared the task finished
    #[serde(default)]
    pub is_done: bool,
    /// Self-reported success, set by the `done` action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// What happened, for the agent's own context only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ActionResult {
    /// An action that changed the page without extracting anything
    pub fn noted(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Default::default()
        }
    }

    /// An action that extracted text
    pub fn extracted(content: impl Into<String>) -> Self {
        Self {
            extracted_content: Some(content.into()),
            ..Default::default()
        }
    }

    /// The terminal `done` action
    pub fn done(content: impl Into<String>, success: bool) -> Self {
        Self {
            extracted_content: Some(content.into()),
            is_done: true,
            success: Some(success),
            ..Default::default()
        }
    }

    /// A failed action
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// One-line description fed back to the model
    pub fn describe(&self) -> String {
        if let Some(error) = &self.error {
            return format!("Error: {}", error);
        }
        let text = self
            .extracted_content
            .as_deref()
            .or(self.note.as_deref())
            .unwrap_or("ok");
        if self.is_done {
            format!("Done: {}", text)
        } else {
            text.to_string()
        }
    }
}

/// One iteration of the agent loop
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryStep {
    /// 1-based step number
    pub step: usize,
    /// Page URL when the step started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Results of the tool calls made in this step
    #[serde(default)]
    pub results: Vec<ActionResult>,
}

/// Ordered record of an agent run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentHistory {
    pub steps: Vec<HistoryStep>,
}

impl AgentHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: HistoryStep) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn last_result(&self) -> Option<&ActionResult> {
        self.steps.last().and_then(|s| s.results.last())
    }

    /// Extracted content of the very last action
    pub fn final_result(&self) -> Option<&str> {
        self.last_result()
            .and_then(|r| r.extracted_content.as_deref())
    }

    /// Whether the last action was `done`
    pub fn is_done(&self) -> bool {
        self.last_result().map(|r| r.is_done).unwrap_or(false)
    }

    /// Self-reported success of the run; `None` when it never finished
    pub fn is_successful(&self) -> Option<bool> {
        self.last_result()
            .filter(|r| r.is_done)
            .map(|r| r.success.unwrap_or(false))
    }

    /// `done` results, most recent first
    pub fn done_results(&self) -> impl Iterator<Item = &ActionResult> {
        self.steps
            .iter()
            .rev()
            .flat_map(|s| s.results.iter().rev())
            .filter(|r| r.is_done)
    }

    /// All extracted fragments in chronological order
    pub fn extracted_content(&self) -> Vec<&str> {
        self.steps
            .iter()
            .flat_map(|s| s.results.iter())
            .filter_map(|r| r.extracted_content.as_deref())
            .collect()
    }

    /// Errors in chronological order
    pub fn errors(&self) -> Vec<&str> {
        self.steps
            .iter()
            .flat_map(|s| s.results.iter())
            .filter_map(|r| r.error.as_deref())
            .collect()
    }

    /// Number of tool calls recorded
    pub fn action_count(&self) -> usize {
        self.steps.iter().map(|s| s.results.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(n: usize, results: Vec<ActionResult>) -> HistoryStep {
        HistoryStep {
            step: n,
            url: None,
            results,
        }
    }

    #[test]
    fn test_final_result_is_last_action() {
        let mut history = AgentHistory::new();
        history.push(step(1, vec![ActionResult::extracted("first")]));
        history.push(step(
            2,
            vec![
                ActionResult::noted("Clicked e4"),
                ActionResult::done("Jane Doe | Mike Lee", true),
            ],
        ));

        assert_eq!(history.final_result(), Some("Jane Doe | Mike Lee"));
        assert!(history.is_done());
        assert_eq!(history.is_successful(), Some(true));
        assert_eq!(history.action_count(), 3);
    }

    #[test]
    fn test_unfinished_run() {
        let mut history = AgentHistory::new();
        history.push(step(1, vec![ActionResult::noted("Navigated")]));

        assert_eq!(history.final_result(), None);
        assert!(!history.is_done());
        assert_eq!(history.is_successful(), None);
    }

    #[test]
    fn test_done_results_most_recent_first() {
        let mut history = AgentHistory::new();
        history.push(step(1, vec![ActionResult::done("old", false)]));
        history.push(step(2, vec![ActionResult::extracted("middle")]));
        history.push(step(3, vec![ActionResult::done("new", true)]));

        let done: Vec<_> = history
            .done_results()
            .filter_map(|r| r.extracted_content.as_deref())
            .collect();
        assert_eq!(done, vec!["new", "old"]);
        assert_eq!(history.extracted_content(), vec!["old", "middle", "new"]);
    }

    #[test]
    fn test_describe() {
        assert_eq!(ActionResult::failed("no such ref").describe(), "Error: no such ref");
        assert_eq!(ActionResult::done("x", true).describe(), "Done: x");
        assert_eq!(ActionResult::noted("Scrolled").describe(), "Scrolled");
        assert_eq!(ActionResult::default().describe(), "ok");
    }
}
