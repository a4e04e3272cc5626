//! Browser module - Chrome process, debugging port, and CDP session
//!
//! Everything that touches the real browser lives here; the environment
//! module sequences these pieces into a lifecycle.

pub mod devtools;
pub mod ports;
pub mod process;
pub mod session;
pub mod snapshot;

pub use process::{chrome_args, terminate_conflicting_processes, ChromeProcess};
pub use session::{AutomationSession, CdpSession};
pub use snapshot::{Element, Snapshot};
