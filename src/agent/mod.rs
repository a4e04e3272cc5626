//! Agent module - the AI actor that drives the browser
//!
//! Contains the agent invocation boundary, the run history it produces, and
//! the LLM-backed implementation with its browser tool set.

pub mod browser_agent;
pub mod history;
pub mod loop_state;
pub mod tools;

pub use browser_agent::{BrowserAgent, LlmBrowserAgent};
pub use history::{ActionResult, AgentHistory, HistoryStep};
pub use loop_state::{AgentLoopState, Observation};
pub use tools::BrowserTools;
