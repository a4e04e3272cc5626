//! Agent loop state management
//!
//! Tracks the state of the ReAct reasoning loop including observations from
//! tool executions and the consecutive-failure budget.

use serde::{Deserialize, Serialize};

/// Observations replayed to the model each turn
const OBSERVATION_WINDOW: usize = 12;

/// State of the agent reasoning loop
#[derive(Debug, Clone)]
pub struct AgentLoopState {
    /// Current turn number (0-indexed)
    pub turn: usize,
    /// Maximum allowed turns
    pub max_turns: usize,
    /// Consecutive turns where nothing succeeded
    pub consecutive_failures: usize,
    /// Failure budget before the run is abandoned
    pub max_failures: usize,
    /// Observations collected from tool executions
    pub observations: Vec<Observation>,
    /// Set once the agent called `done`
    pub finished: bool,
}

impl AgentLoopState {
    pub fn new(max_turns: usize, max_failures: usize) -> Self {
        Self {
            turn: 0,
            max_turns,
            consecutive_failures: 0,
            max_failures,
            observations: Vec::new(),
            finished: false,
        }
    }

    /// Check if the loop should continue
    pub fn should_continue(&self) -> bool {
        self.turn < self.max_turns
            && !self.finished
            && self.consecutive_failures < self.max_failures
    }

    /// Format recent observations for inclusion in the next prompt
    pub fn format_observations(&self) -> String {
        if self.observations.is_empty() {
            return String::new();
        }

        let skip = self.observations.len().saturating_sub(OBSERVATION_WINDOW);
        let mut output = String::from("\n\n## Previous actions:\n");
        for (i, obs) in self.observations.iter().enumerate().skip(skip) {
            let status = if obs.success { "ok" } else { "failed" };
            output.push_str(&format!(
                "{}. {} [{}]: {}\n",
                i + 1,
                obs.tool_name,
                status,
                obs.output
            ));
        }
        output
    }

    /// Add observations from a batch of tool executions
    pub fn add_observations(&mut self, observations: Vec<Observation>) {
        self.observations.extend(observations);
    }

    /// Count a turn where every action failed
    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
    }

    /// Reset the failure streak
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Increment the turn counter
    pub fn next_turn(&mut self) {
        self.turn += 1;
    }
}

/// An observation from a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Name of the tool that produced this observation
    pub tool_name: String,
    /// Whether the tool execution was successful
    pub success: bool,
    /// Human-readable output from the tool
    pub output: String,
}

impl Observation {
    /// Create a successful observation
    pub fn success(tool_name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            output: output.into(),
        }
    }

    /// Create an error observation
    pub fn error(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            output: error.into(),
        }
    }
}
