//! CLI module - console output
//!
//! Contains the startup banner and the end-of-run summary.

pub mod report;

pub use report::{print_banner, print_failure, print_summary, summary_lines};
