//! Task executor
//!
//! Builds the instruction for one profile, runs the environment's agent
//! against its live session under a timeout, and normalizes the outcome
//! into an [`AttemptResult`].

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::agent::BrowserAgent;
use crate::browser::AutomationSession;
use crate::core::config::BatchConfig;
use crate::core::{AttemptResult, MutualsError};
use crate::pipeline::normalize::{self, Resolution};

/// Instruction sent to the agent for every profile
pub const INSTRUCTION_TEMPLATE: &str = r#"Open {profile_url} and extract the names of mutual connections.

STEP 1 (always): navigate to this exact URL: {profile_url}
Do not continue from whatever page is currently open.

STEP 2: on the profile page, look for a line such as "John Doe, Jane Smith and 12 other mutual connections".
- If there is no such line, finish with "No mutual connections found".

STEP 3: click that line. LinkedIn opens a page whose URL contains "search/results/people".
That page IS the list of mutual connections. Stay on it; do not go back to the profile.

STEP 4: read the FULL NAMES of the first {count} people listed there.
Finish with only the names, separated by " | ", for example:
Jane Doe | Mike Lee | Sarah Wilson

Rules:
- Do not use a search engine and do not open "Contact info".
- Do not create or download files.
- If fewer than {count} people are listed, return the names you see.
- If there are no mutual connections, return "No mutual connections found"."#;

/// Render the instruction for one profile
pub fn build_instruction(profile_url: &str, count: usize) -> String {
    INSTRUCTION_TEMPLATE
        .replace("{profile_url}", profile_url)
        .replace("{count}", &count.to_string())
}

/// Runs one agent attempt for one profile
pub struct TaskExecutor {
    timeout: Duration,
    target_count: usize,
    page_keyword: String,
}

impl TaskExecutor {
    pub fn new(config: &BatchConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.task_timeout_secs),
            target_count: config.target_count,
            page_keyword: config.page_keyword.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Instruction for `profile_url` with the configured result count
    pub fn instruction_for(&self, profile_url: &str) -> String {
        build_instruction(profile_url, self.target_count)
    }

    /// Run `agent` once against `session`. Never fails: every outcome is an
    /// `AttemptResult`.
    pub async fn run(
        &self,
        agent: &dyn BrowserAgent,
        session: &dyn AutomationSession,
        instruction: &str,
    ) -> AttemptResult {
        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(self.timeout, agent.run(instruction, session)).await;

        let history = match outcome {
            Err(_) => {
                let e = MutualsError::AgentTimeout {
                    secs: self.timeout.as_secs(),
                };
                warn!(error = %e, "Agent run timed out");
                return AttemptResult::failed(normalize::TIMEOUT, e.to_string());
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Agent run failed");
                return normalize::error_result(e);
            }
            Ok(Ok(history)) => history,
        };

        debug!(
            steps = history.len(),
            actions = history.action_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Agent run complete"
        );

        match normalize::normalize(&history) {
            Resolution::Payload(payload) => {
                info!(payload = %payload, "Result extracted");
                AttemptResult::done(payload)
            }
            Resolution::NeedsPageCheck => {
                info!("No result from agent, checking page content");
                match session.page_text().await {
                    Ok(text) => {
                        let payload = normalize::classify_page_text(&text, &self.page_keyword);
                        info!(payload = %payload, "Classified from page content");
                        AttemptResult::done(payload)
                    }
                    Err(e) => {
                        warn!(error = %e, "Could not read page content");
                        normalize::error_result(e)
                    }
                }
            }
        }
    }
}
