//! Shared types used across mutuals modules
//!
//! Contains the work-item model persisted in the spreadsheet and the
//! message/tool structures exchanged with the LLM backend.

use serde::{Deserialize, Serialize};

/// Processing status of one spreadsheet row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkStatus {
    /// Not yet attempted (empty status cell)
    Pending,
    /// Picked up by the current run
    Processing,
    /// Finished; never selected again
    Done,
    /// Failed; re-run only after an external status reset
    Error,
}

impl WorkStatus {
    /// Value written to the status column
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::Pending => "",
            WorkStatus::Processing => "processing",
            WorkStatus::Done => "done",
            WorkStatus::Error => "error",
        }
    }

    /// Parse a status cell. Comparison is case-insensitive and ignores
    /// surrounding whitespace; unknown values are treated as pending.
    pub fn parse(cell: &str) -> Self {
        let cell = cell.trim();
        if cell.eq_ignore_ascii_case("done") {
            WorkStatus::Done
        } else if cell.eq_ignore_ascii_case("processing") {
            WorkStatus::Processing
        } else if cell.eq_ignore_ascii_case("error") {
            WorkStatus::Error
        } else {
            WorkStatus::Pending
        }
    }

    /// Whether a status cell marks the row as done
    pub fn is_done_cell(cell: &str) -> bool {
        cell.trim().eq_ignore_ascii_case("done")
    }
}

impl std::fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkStatus::Pending => write!(f, "pending"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// One queued unit of batch work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Zero-based row index in storage order
    pub row_index: usize,
    /// Profile URL to process
    pub target_identifier: String,
}

impl WorkItem {
    pub fn new(row_index: usize, target_identifier: impl Into<String>) -> Self {
        Self {
            row_index,
            target_identifier: target_identifier.into(),
        }
    }
}

/// Outcome of a single task attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptResult {
    /// Whether the attempt counts as a success
    pub success: bool,
    /// Text written to the result column
    pub result_payload: String,
    /// Status written to the status column
    pub status: WorkStatus,
    /// Diagnostic for failed attempts
    pub error_detail: Option<String>,
}

impl AttemptResult {
    /// Create a successful result
    pub fn done(payload: impl Into<String>) -> Self {
        Self {
            success: true,
            result_payload: payload.into(),
            status: WorkStatus::Done,
            error_detail: None,
        }
    }

    /// Create a failed result
    pub fn failed(payload: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            result_payload: payload.into(),
            status: WorkStatus::Error,
            error_detail: Some(detail.into()),
        }
    }
}

/// A message in an LLM exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (user, assistant, system)
    pub role: String,
    /// Content of the message
    pub content: String,
    /// Optional tool calls made by the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            tool_calls: None,
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            tool_calls: None,
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
            tool_calls: None,
        }
    }
}

/// A tool call made by the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to invoke
    pub name: String,
    /// JSON arguments for the tool
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Get a string argument by key
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.arguments
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    /// Get a boolean argument by key
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.arguments.get(key).and_then(|v| v.as_bool())
    }

    /// Get an integer argument by key
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.arguments.get(key).and_then(|v| v.as_i64())
    }
}

/// Definition of a tool that can be called by the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Name of the function
    pub name: String,
    /// Description of what the function does
    pub description: String,
    /// JSON Schema for the parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new function tool definition
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}
