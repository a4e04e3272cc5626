//! mutuals - Resumable LinkedIn mutual-connections extraction
//!
//! Reads a spreadsheet of LinkedIn profile URLs and, for every row not yet
//! done, launches a dedicated Chrome, lets an LLM-driven browser agent open
//! the profile and read the mutual connections, and writes the names back
//! next to the URL.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, logging, and error handling
//! - **Store**: Spreadsheet-backed work queue with resume and backups
//! - **Browser**: Chrome process, DevTools probe, and automation session
//! - **Environment**: One browser + session aggregate per work item
//! - **LLM**: LLM provider abstraction with a Gemini implementation
//! - **Agent**: Browser agent loop and its history
//! - **Pipeline**: Task executor, retry wrapper, and batch orchestrator
//! - **CLI**: Banner and run summary
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use mutuals::agent::LlmBrowserAgent;
//! use mutuals::environment::ChromeEnvironmentProvider;
//! use mutuals::llm::GeminiClient;
//! use mutuals::pipeline::BatchOrchestrator;
//! use mutuals::Config;
//!
//! #[tokio::main]
//! async fn main() -> mutuals::Result<()> {
//!     let config = Config::load();
//!     config.validate()?;
//!
//!     let llm = Arc::new(GeminiClient::from_config(&config)?);
//!     let agent = Arc::new(LlmBrowserAgent::new(llm, &config.agent));
//!     let provider = Arc::new(ChromeEnvironmentProvider::new(config.browser.clone(), agent));
//!
//!     let report = BatchOrchestrator::new(&config.batch, provider)
//!         .run(Path::new("people.xlsx"))
//!         .await?;
//!     println!("{} rows processed", report.processed);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod browser;
pub mod cli;
pub mod core;
pub mod environment;
pub mod llm;
pub mod pipeline;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used items
pub use core::{Config, MutualsError, Result};
pub use pipeline::{BatchOrchestrator, BatchReport};
pub use store::WorkStore;
