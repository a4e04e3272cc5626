//! LLM module - Language Model integrations
//!
//! Provides the provider abstraction used by the browser agent, with
//! Google Gemini as the backend.

pub mod gemini;
pub mod traits;

pub use gemini::GeminiClient;
pub use traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};
