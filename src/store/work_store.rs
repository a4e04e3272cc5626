//! Spreadsheet-backed work queue
//!
//! Owns profile-URL column detection, result/status column provisioning,
//! resume-point computation, and durable save with backup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::{MutualsError, Result, WorkItem, WorkStatus};
use crate::store::identifier::is_profile_url;
use crate::store::table::{is_null, Table};

/// Header of the result column
pub const RESULT_COLUMN: &str = "mutual_connections";
/// Header of the status column
pub const STATUS_COLUMN: &str = "status";
/// Non-empty values sampled per column during detection
pub const DETECTION_SAMPLE: usize = 10;

/// Work queue over a tabular file
#[derive(Debug)]
pub struct WorkStore {
    path: PathBuf,
    table: Table,
    identifier_column: Option<String>,
}

/// Snapshot of the store for logging and the final report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSummary {
    pub total_rows: usize,
    pub total_columns: usize,
    pub identifier_column: Option<String>,
    pub result_column: Option<String>,
    pub status_column: Option<String>,
    pub status_distribution: BTreeMap<String, usize>,
    pub rows_completed: usize,
    pub rows_remaining: usize,
}

impl std::fmt::Display for StoreSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} rows, {} columns, url column {:?}, {} done, {} remaining",
            self.total_rows,
            self.total_columns,
            self.identifier_column.as_deref().unwrap_or("-"),
            self.rows_completed,
            self.rows_remaining
        )
    }
}

impl WorkStore {
    /// Read the backing dataset
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(MutualsError::data_load(format!(
                "File not found: {}",
                path.display()
            )));
        }

        info!(path = %path.display(), "Loading spreadsheet");
        let table = Table::read(&path)?;
        info!(
            rows = table.row_count(),
            columns = table.column_count(),
            "Spreadsheet loaded"
        );
        debug!(columns = ?table.headers(), "Columns found");

        Ok(Self::from_table(path, table))
    }

    /// Wrap an in-memory table that will be saved to `path`
    pub fn from_table(path: impl Into<PathBuf>, table: Table) -> Self {
        Self {
            path: path.into(),
            table,
            identifier_column: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.row_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the detected profile URL column
    pub fn identifier_column(&self) -> Option<&str> {
        self.identifier_column.as_deref()
    }

    /// Find the first column whose sampled non-empty values are at least
    /// 70% profile URLs. Columns are scanned left to right.
    pub fn detect_identifier_column(&mut self) -> Option<String> {
        for (index, header) in self.table.headers().iter().enumerate() {
            let sample: Vec<&str> = self
                .table
                .non_empty_values(index)
                .take(DETECTION_SAMPLE)
                .collect();
            if sample.is_empty() {
                continue;
            }

            let matches = sample.iter().filter(|v| is_profile_url(v)).count();
            debug!(column = %header, matches, sampled = sample.len(), "Scanned column");

            if matches * 10 >= sample.len() * 7 {
                info!(column = %header, "LinkedIn URL column detected");
                self.identifier_column = Some(header.clone());
                return Some(header.clone());
            }
        }

        warn!("No LinkedIn URL column detected");
        self.identifier_column = None;
        None
    }

    /// Add the result and status columns right after the identifier column
    /// when they are missing. Existing columns are never moved or duplicated.
    pub fn ensure_result_columns(&mut self) -> Result<()> {
        let identifier = self.identifier_column.clone().ok_or_else(|| {
            MutualsError::NoIdentifierColumn(self.path.display().to_string())
        })?;
        let id_index = self
            .table
            .column_index(&identifier)
            .ok_or_else(|| MutualsError::NoIdentifierColumn(self.path.display().to_string()))?;

        if self.table.column_index(RESULT_COLUMN).is_none() {
            self.table.insert_column(id_index + 1, RESULT_COLUMN);
            info!(column = RESULT_COLUMN, "Added result column");
        } else {
            info!(column = RESULT_COLUMN, "Found existing result column");
        }

        if self.table.column_index(STATUS_COLUMN).is_none() {
            self.table.insert_column(id_index + 2, STATUS_COLUMN);
            info!(column = STATUS_COLUMN, "Added status column");
        } else {
            info!(column = STATUS_COLUMN, "Found existing status column");
        }

        Ok(())
    }

    fn status_index(&self) -> Option<usize> {
        self.table.column_index(STATUS_COLUMN)
    }

    fn result_index(&self) -> Option<usize> {
        self.table.column_index(RESULT_COLUMN)
    }

    fn identifier_index(&self) -> Option<usize> {
        self.identifier_column
            .as_deref()
            .and_then(|name| self.table.column_index(name))
    }

    /// Index of the first row not marked done, or `len()` when every row is.
    pub fn find_resume_index(&self) -> usize {
        let Some(status) = self.status_index() else {
            return 0;
        };

        for row in 0..self.len() {
            if !WorkStatus::is_done_cell(self.table.cell(row, status)) {
                info!(row = row + 1, index = row, "Resuming");
                return row;
            }
        }

        info!("All rows are marked as done");
        self.len()
    }

    /// Rows at or after `from_index` with a valid profile URL and a status
    /// other than done. The iterator is lazy and can be recreated at will.
    pub fn pending_items(&self, from_index: usize) -> PendingItems<'_> {
        PendingItems {
            store: self,
            identifier: self.identifier_index(),
            status: self.status_index(),
            next: from_index,
        }
    }

    /// Mark a row as picked up by the current run
    pub fn mark_processing(&mut self, row_index: usize) -> Result<()> {
        self.check_row(row_index)?;
        if let Some(status) = self.status_index() {
            self.table
                .set_cell(row_index, status, WorkStatus::Processing.as_str())?;
            debug!(row = row_index + 1, "Status set to processing");
        }
        Ok(())
    }

    /// Write a row's payload and status
    pub fn update(&mut self, row_index: usize, payload: &str, status: WorkStatus) -> Result<()> {
        self.check_row(row_index)?;
        if let Some(result) = self.result_index() {
            self.table.set_cell(row_index, result, payload)?;
        }
        if let Some(column) = self.status_index() {
            self.table.set_cell(row_index, column, status.as_str())?;
        }
        debug!(row = row_index + 1, payload, status = %status, "Row updated");
        Ok(())
    }

    /// Status of a row as currently held in memory
    pub fn status(&self, row_index: usize) -> Result<WorkStatus> {
        self.check_row(row_index)?;
        Ok(self
            .status_index()
            .map(|c| WorkStatus::parse(self.table.cell(row_index, c)))
            .unwrap_or(WorkStatus::Pending))
    }

    /// Payload of a row as currently held in memory
    pub fn payload(&self, row_index: usize) -> Result<&str> {
        self.check_row(row_index)?;
        Ok(self
            .result_index()
            .map(|c| self.table.cell(row_index, c))
            .unwrap_or(""))
    }

    fn check_row(&self, row_index: usize) -> Result<()> {
        if row_index >= self.len() {
            return Err(MutualsError::RowOutOfRange {
                index: row_index,
                len: self.len(),
            });
        }
        Ok(())
    }

    /// Write the current state back to the original file.
    ///
    /// With `create_backup`, the file currently on disk is copied aside
    /// first; if that copy fails nothing is written.
    pub fn save(&self, create_backup: bool) -> Result<Option<PathBuf>> {
        let backup = (create_backup && self.path.exists()).then(|| backup_path_for(&self.path));
        self.save_with_backup(backup)
    }

    fn save_with_backup(&self, backup: Option<PathBuf>) -> Result<Option<PathBuf>> {
        if let Some(backup_path) = &backup {
            std::fs::copy(&self.path, backup_path).map_err(|e| {
                MutualsError::persistence(format!(
                    "Failed to create backup {}: {}",
                    backup_path.display(),
                    e
                ))
            })?;
            info!(backup = %backup_path.display(), "Created backup");
        }

        self.table.write(&self.path)?;
        info!(path = %self.path.display(), "Data saved");
        Ok(backup)
    }

    /// Counts per status, for logging and the final report
    pub fn summary(&self) -> StoreSummary {
        let mut summary = StoreSummary {
            total_rows: self.len(),
            total_columns: self.table.column_count(),
            identifier_column: self.identifier_column.clone(),
            result_column: self.result_index().map(|_| RESULT_COLUMN.to_string()),
            status_column: self.status_index().map(|_| STATUS_COLUMN.to_string()),
            ..Default::default()
        };

        if let Some(status) = self.status_index() {
            for row in 0..self.len() {
                let cell = self.table.cell(row, status).trim();
                if is_null(cell) {
                    continue;
                }
                *summary
                    .status_distribution
                    .entry(cell.to_lowercase())
                    .or_insert(0) += 1;
            }
            summary.rows_completed = summary
                .status_distribution
                .get(WorkStatus::Done.as_str())
                .copied()
                .unwrap_or(0);
        }
        summary.rows_remaining = summary.total_rows - summary.rows_completed;
        summary
    }
}

/// Lazy sequence of pending work items
pub struct PendingItems<'a> {
    store: &'a WorkStore,
    identifier: Option<usize>,
    status: Option<usize>,
    next: usize,
}

impl Iterator for PendingItems<'_> {
    type Item = WorkItem;

    fn next(&mut self) -> Option<Self::Item> {
        let identifier = self.identifier?;
        let table = &self.store.table;

        while self.next < table.row_count() {
            let row = self.next;
            self.next += 1;

            let url = table.cell(row, identifier).trim();
            if is_null(url) {
                continue;
            }
            if let Some(status) = self.status {
                if WorkStatus::is_done_cell(table.cell(row, status)) {
                    continue;
                }
            }
            if !is_profile_url(url) {
                warn!(row = row + 1, url, "Invalid LinkedIn URL, skipping");
                continue;
            }
            return Some(WorkItem::new(row, url));
        }

        None
    }
}

/// `people.xlsx` -> `people.backup.xlsx`, then timestamped variants when
/// that name is taken.
pub fn backup_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let with_name = |suffix: &str| path.with_file_name(format!("{}{}{}", stem, suffix, ext));

    let plain = with_name(".backup");
    if !plain.exists() {
        return plain;
    }

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let stamped = with_name(&format!(".backup_{}", timestamp));
    if !stamped.exists() {
        return stamped;
    }

    (1..)
        .map(|n| with_name(&format!(".backup_{}_{}", timestamp, n)))
        .find(|p| !p.exists())
        .unwrap_or(stamped)
}
