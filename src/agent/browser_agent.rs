//! LLM-driven browser agent
//!
//! Implements a ReAct-style loop (observe page → model picks tool calls →
//! execute → record results) against an automation session.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::agent::history::{ActionResult, AgentHistory, HistoryStep};
use crate::agent::loop_state::{AgentLoopState, Observation};
use crate::agent::tools::{truncate, BrowserTools};
use crate::browser::AutomationSession;
use crate::core::config::AgentConfig;
use crate::core::{Message, MutualsError, Result};
use crate::llm::{GenerateOptions, LLMProvider};

/// Characters of each tool outcome replayed to the model
const OBSERVATION_LIMIT: usize = 2000;

const SYSTEM_PROMPT: &str = r#"You are a browser automation agent. You control a real Chrome tab through tools.

Each turn you receive the task, the current page (URL, title and interactive elements tagged [ref=eN]) and the outcome of your previous actions.

## Tools
- `navigate`: open a URL. Args: {"url": "https://..."}
- `click`: click an element. Args: {"ref": "e12"}
- `fill`: type into an input. Args: {"ref": "e5", "text": "..."}
- `scroll`: scroll the page. Args: {"pixels": 600}
- `go_back`: return to the previous page
- `extract_content`: read the visible text of the page
- `done`: finish. Args: {"text": "<final answer>", "success": true}

## Rules
- Use EXACT refs from the LATEST page listing; refs change after every navigation.
- Prefer one action per turn unless the actions are independent.
- Call `done` as soon as you have the answer, with the answer in exactly the requested format.
- If the task cannot be completed, call `done` with success=false and explain why in `text`."#;

/// The agent invocation boundary: task text plus live session in, history out.
///
/// An `Err` means the agent never got to act, for example because its model
/// backend was unreachable for the whole run.
#[async_trait]
pub trait BrowserAgent: Send + Sync {
    async fn run(&self, task: &str, session: &dyn AutomationSession) -> Result<AgentHistory>;
}

/// Browser agent backed by an [`LLMProvider`]
pub struct LlmBrowserAgent {
    llm: Arc<dyn LLMProvider>,
    model: String,
    tools: BrowserTools,
    max_steps: usize,
    max_failures: usize,
    temperature: f32,
}

impl LlmBrowserAgent {
    pub fn new(llm: Arc<dyn LLMProvider>, config: &AgentConfig) -> Self {
        Self {
            llm,
            model: config.model.clone(),
            tools: BrowserTools::new(),
            max_steps: config.max_steps,
            max_failures: config.max_failures.max(1),
            temperature: config.temperature,
        }
    }

    fn build_messages(&self, task: &str, page: &str, state: &AgentLoopState) -> Vec<Message> {
        let user_content = format!(
            "## Task\n{}\n\n## Step {} of {}\n\n## Current page\n{}{}",
            task,
            state.turn + 1,
            state.max_turns,
            page,
            state.format_observations()
        );
        vec![Message::system(SYSTEM_PROMPT), Message::user(user_content)]
    }
}

#[async_trait]
impl BrowserAgent for LlmBrowserAgent {
    async fn run(&self, task: &str, session: &dyn AutomationSession) -> Result<AgentHistory> {
        let mut state = AgentLoopState::new(self.max_steps, self.max_failures);
        let mut history = AgentHistory::new();
        let mut answered = false;
        let mut last_model_error: Option<MutualsError> = None;

        info!(
            provider = self.llm.name(),
            model = %self.model,
            max_steps = self.max_steps,
            "Starting agent run"
        );

        while state.should_continue() {
            let step = state.turn + 1;
            let url = session.current_url().await.ok();
            let page = match session.snapshot().await {
                Ok(snapshot) => snapshot.format_for_display(),
                Err(e) => {
                    warn!(step, error = %e, "Page snapshot failed");
                    format!("Page snapshot unavailable: {}", e)
                }
            };

            let messages = self.build_messages(task, &page, &state);
            let options = GenerateOptions {
                temperature: Some(self.temperature),
                ..Default::default()
            };
            let response = match self
                .llm
                .chat_with_tools(&self.model, &messages, self.tools.definitions(), Some(options))
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    warn!(step, error = %e, "Model call failed");
                    history.push(HistoryStep {
                        step,
                        url,
                        results: vec![ActionResult::failed(format!("Model call failed: {}", e))],
                    });
                    state.add_observations(vec![Observation::error("model", e.to_string())]);
                    state.record_failure();
                    state.next_turn();
                    last_model_error = Some(e);
                    continue;
                }
            };
            answered = true;

            let mut results = Vec::new();
            let mut observations = Vec::new();

            if response.tool_calls.is_empty() {
                // a plain text answer ends the run
                let text = response.content.trim();
                if text.is_empty() {
                    results.push(ActionResult::failed(
                        "Model returned neither text nor tool calls",
                    ));
                } else {
                    results.push(ActionResult::done(text, true));
                }
            } else {
                debug!(step, calls = response.tool_calls.len(), "Executing tool calls");
                for call in &response.tool_calls {
                    let result = self.tools.execute(session, call).await;
                    let summary = truncate(&result.describe(), OBSERVATION_LIMIT);
                    observations.push(if result.is_error() {
                        Observation::error(&call.name, summary)
                    } else {
                        Observation::success(&call.name, summary)
                    });

                    let done = result.is_done;
                    results.push(result);
                    if done {
                        break;
                    }
                }
            }

            let all_failed = results.iter().all(ActionResult::is_error);
            let finished = results.iter().any(|r| r.is_done);
            for result in &results {
                debug!(step, outcome = %truncate(&result.describe(), 200), "Step result");
            }

            history.push(HistoryStep { step, url, results });
            state.add_observations(observations);
            if all_failed {
                state.record_failure();
            } else {
                state.record_success();
            }
            state.finished = finished;
            state.next_turn();
        }

        if !answered {
            if let Some(e) = last_model_error {
                warn!(steps = history.len(), error = %e, "Model never answered");
                return Err(e);
            }
        }

        if state.finished {
            info!(steps = history.len(), success = ?history.is_successful(), "Agent finished");
        } else if state.consecutive_failures >= state.max_failures {
            warn!(steps = history.len(), failures = state.consecutive_failures, "Agent stopped after repeated failures");
        } else {
            warn!(steps = history.len(), "Agent reached the step limit without finishing");
        }

        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MutualsError, ToolCall};
    use crate::llm::LLMResponse;
    use crate::testing::{FakeSession, ScriptedLlm};
    use serde_json::json;

    fn agent(llm: ScriptedLlm, max_steps: usize, max_failures: usize) -> LlmBrowserAgent {
        let config = AgentConfig {
            max_steps,
            max_failures,
            ..AgentConfig::default()
        };
        LlmBrowserAgent::new(Arc::new(llm), &config)
    }

    #[tokio::test]
    async fn test_run_until_done() {
        let llm = ScriptedLlm::new(vec![
            Ok(LLMResponse::with_tool_calls(vec![ToolCall::new(
                "navigate",
                json!({"url": "https://www.linkedin.com/in/alice"}),
            )])),
            Ok(LLMResponse::with_tool_calls(vec![ToolCall::new("click", json!({"ref": "e1"}))])),
            Ok(LLMResponse::with_tool_calls(vec![ToolCall::new(
                "done",
                json!({"text": "Jane Doe | Mike Lee", "success": true}),
            )])),
        ]);
        let session = FakeSession::new("https://www.linkedin.com/feed/", "");

        let history = agent(llm, 10, 3).run("find mutuals", &session).await.unwrap();

        assert_eq!(history.len(), 3);
        assert_eq!(history.final_result(), Some("Jane Doe | Mike Lee"));
        assert_eq!(history.is_successful(), Some(true));
        assert_eq!(
            session.actions(),
            vec!["navigate https://www.linkedin.com/in/alice", "click e1"]
        );
    }

    #[tokio::test]
    async fn test_text_answer_ends_run() {
        let llm = ScriptedLlm::new(vec![Ok(LLMResponse::text("No mutual connections found"))]);
        let session = FakeSession::new("https://www.linkedin.com/in/bob", "");

        let history = agent(llm, 10, 3).run("task", &session).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history.is_done());
        assert_eq!(history.final_result(), Some("No mutual connections found"));
    }

    #[tokio::test]
    async fn test_stops_after_consecutive_failures() {
        let llm = ScriptedLlm::new(vec![
            Err(MutualsError::llm("503")),
            Ok(LLMResponse::with_tool_calls(vec![ToolCall::new("teleport", json!({}))])),
            Err(MutualsError::llm("503")),
            Ok(LLMResponse::text("never reached")),
        ]);
        let session = FakeSession::new("https://www.linkedin.com/feed/", "");

        let history = agent(llm, 10, 3).run("task", &session).await.unwrap();
        assert_eq!(history.len(), 3);
        assert!(!history.is_done());
        assert_eq!(history.errors().len(), 3);
    }

    #[tokio::test]
    async fn test_unreachable_model_is_error() {
        let llm = ScriptedLlm::new(vec![
            Err(MutualsError::llm("401 API key invalid")),
            Err(MutualsError::llm("401 API key invalid")),
            Err(MutualsError::llm("401 API key invalid")),
        ]);
        let session = FakeSession::new("https://www.linkedin.com/feed/", "");

        let err = agent(llm, 10, 3).run("task", &session).await.unwrap_err();
        assert!(matches!(err, MutualsError::Llm(ref msg) if msg.contains("401")));
        assert!(session.actions().is_empty());
    }

    #[tokio::test]
    async fn test_step_limit() {
        let responses = (0..5)
            .map(|_| Ok(LLMResponse::with_tool_calls(vec![ToolCall::new("scroll", json!({}))])))
            .collect();
        let session = FakeSession::new("https://www.linkedin.com/feed/", "");

        let history = agent(ScriptedLlm::new(responses), 2, 3)
            .run("task", &session)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.is_successful(), None);
        assert_eq!(session.actions(), vec!["scroll 600", "scroll 600"]);
    }

    #[tokio::test]
    async fn test_extract_content_records_fragment() {
        let llm = ScriptedLlm::new(vec![
            Ok(LLMResponse::with_tool_calls(vec![ToolCall::new(
                "extract_content",
                json!({"goal": "names"}),
            )])),
            Ok(LLMResponse::with_tool_calls(vec![ToolCall::new(
                "done",
                json!({"text": "", "success": false}),
            )])),
        ]);
        let session = FakeSession::new("https://www.linkedin.com/search/results/people/", "Jane Doe\nMike Lee");

        let history = agent(llm, 10, 3).run("task", &session).await.unwrap();
        assert_eq!(history.extracted_content(), vec!["Jane Doe\nMike Lee", ""]);
        assert_eq!(history.is_successful(), Some(false));
    }
}
