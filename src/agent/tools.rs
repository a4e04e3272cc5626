//! Browser tool set - definitions and dispatch
//!
//! Each tool call from the model is executed against the live session and
//! turned into an [`ActionResult`]. Tool failures never abort the run; they
//! are reported back to the model.

use serde_json::json;
use tracing::debug;

use crate::agent::history::ActionResult;
use crate::browser::AutomationSession;
use crate::core::{ToolCall, ToolDefinition};

/// Characters of page text returned by `extract_content`
const EXTRACT_LIMIT: usize = 6000;

/// Default scroll distance in pixels
const DEFAULT_SCROLL: i64 = 600;

/// Tools the browser agent can call
pub struct BrowserTools {
    definitions: Vec<ToolDefinition>,
}

impl Default for BrowserTools {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserTools {
    pub fn new() -> Self {
        let definitions = vec![
            ToolDefinition::function(
                "navigate",
                "Open a URL in the current tab",
                json!({
                    "type": "object",
                    "properties": {
                        "url": {
                            "type": "string",
                            "description": "Absolute URL to open"
                        }
                    },
                    "required": ["url"]
                }),
            ),
            ToolDefinition::function(
                "click",
                "Click an element from the page snapshot",
                json!({
                    "type": "object",
                    "properties": {
                        "ref": {
                            "type": "string",
                            "description": "Element ref from the snapshot, e.g. e12"
                        }
                    },
                    "required": ["ref"]
                }),
            ),
            ToolDefinition::function(
                "fill",
                "Replace the text of an input element",
                json!({
                    "type": "object",
                    "properties": {
                        "ref": {
                            "type": "string",
                            "description": "Element ref of the input"
                        },
                        "text": {
                            "type": "string",
                            "description": "Text to type"
                        }
                    },
                    "required": ["ref", "text"]
                }),
            ),
            ToolDefinition::function(
                "scroll",
                "Scroll the page vertically",
                json!({
                    "type": "object",
                    "properties": {
                        "pixels": {
                            "type": "integer",
                            "description": "Distance in pixels; negative scrolls up (default 600)"
                        }
                    }
                }),
            ),
            ToolDefinition::function(
                "go_back",
                "Go back to the previous page",
                json!({
                    "type": "object",
                    "properties": {}
                }),
            ),
            ToolDefinition::function(
                "extract_content",
                "Read the visible text of the current page",
                json!({
                    "type": "object",
                    "properties": {
                        "goal": {
                            "type": "string",
                            "description": "What you are looking for"
                        }
                    }
                }),
            ),
            ToolDefinition::function(
                "done",
                "Finish the task and report the result",
                json!({
                    "type": "object",
                    "properties": {
                        "text": {
                            "type": "string",
                            "description": "Final answer in the requested format"
                        },
                        "success": {
                            "type": "boolean",
                            "description": "Whether the task was completed"
                        }
                    },
                    "required": ["text", "success"]
                }),
            ),
        ];

        Self { definitions }
    }

    /// Get all tool definitions
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Check whether a tool exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.definitions.iter().any(|d| d.name == name)
    }

    /// Execute a tool call
    pub async fn execute(&self, session: &dyn AutomationSession, call: &ToolCall) -> ActionResult {
        debug!(tool = %call.name, args = %call.arguments, "Executing tool");

        match call.name.as_str() {
            "navigate" => {
                let Some(url) = call.get_string("url").filter(|u| !u.trim().is_empty()) else {
                    return ActionResult::failed("navigate requires a url");
                };
                match session.navigate(&url).await {
                    Ok(()) => ActionResult::noted(format!("Navigated to {}", url)),
                    Err(e) => ActionResult::failed(format!("Navigation to {} failed: {}", url, e)),
                }
            }
            "click" => {
                let Some(ref_id) = call.get_string("ref") else {
                    return ActionResult::failed("click requires a ref");
                };
                match session.click(&ref_id).await {
                    Ok(()) => ActionResult::noted(format!("Clicked {}", ref_id)),
                    Err(e) => ActionResult::failed(format!("Click on {} failed: {}", ref_id, e)),
                }
            }
            "fill" => {
                let (Some(ref_id), Some(text)) = (call.get_string("ref"), call.get_string("text"))
                else {
                    return ActionResult::failed("fill requires a ref and text");
                };
                match session.fill(&ref_id, &text).await {
                    Ok(()) => ActionResult::noted(format!("Filled {} with '{}'", ref_id, text)),
                    Err(e) => ActionResult::failed(format!("Fill on {} failed: {}", ref_id, e)),
                }
            }
            "scroll" => {
                let pixels = call.get_i64("pixels").unwrap_or(DEFAULT_SCROLL);
                match session.scroll(pixels).await {
                    Ok(()) => ActionResult::noted(format!("Scrolled {} pixels", pixels)),
                    Err(e) => ActionResult::failed(format!("Scroll failed: {}", e)),
                }
            }
            "go_back" => match session.go_back().await {
                Ok(()) => ActionResult::noted("Went back"),
                Err(e) => ActionResult::failed(format!("Go back failed: {}", e)),
            },
            "extract_content" => match session.page_text().await {
                Ok(text) => ActionResult::extracted(truncate(&text, EXTRACT_LIMIT)),
                Err(e) => ActionResult::failed(format!("Extraction failed: {}", e)),
            },
            "done" => {
                let text = call.get_string("text").unwrap_or_default();
                let success = call.get_bool("success").unwrap_or(true);
                ActionResult::done(text, success)
            }
            other => ActionResult::failed(format!("Unknown tool: {}", other)),
        }
    }
}

/// Cut `text` to at most `limit` characters on a char boundary
pub(crate) fn truncate(text: &str, limit: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
