//! Pipeline module - the batch run
//!
//! Retry wrapper and task executor for single profiles, result
//! normalization, and the orchestrator that walks the spreadsheet.

pub mod executor;
pub mod normalize;
pub mod orchestrator;
pub mod retry;

pub use executor::{build_instruction, TaskExecutor, INSTRUCTION_TEMPLATE};
pub use normalize::{normalize, Resolution};
pub use orchestrator::{BatchOrchestrator, BatchReport};
pub use retry::process_with_retry;
