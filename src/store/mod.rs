//! Tabular work store
//!
//! The spreadsheet is both the work queue and the result sink.

pub mod identifier;
pub mod table;
pub mod work_store;

pub use identifier::is_profile_url;
pub use table::{Table, TableFormat};
pub use work_store::{StoreSummary, WorkStore, RESULT_COLUMN, STATUS_COLUMN};
