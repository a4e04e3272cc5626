//! Row/column dataset backing the work store
//!
//! Reads and writes `.csv` and `.xlsx` files. Every cell carries its display
//! text; an empty string is a null cell. Cells read from a workbook also keep
//! their number, boolean or date value so a save writes them back with the
//! same type. Writes go through a temporary file in the target directory and
//! are renamed into place.

use std::io::Write;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::core::{MutualsError, Result};

/// On-disk format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Xlsx,
}

impl TableFormat {
    /// Detect the format from a path's extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(TableFormat::Csv),
            "xlsx" => Ok(TableFormat::Xlsx),
            "xls" => Err(MutualsError::data_load(format!(
                "Legacy .xls files cannot be written back; convert {} to .xlsx",
                path.display()
            ))),
            _ => Err(MutualsError::data_load(format!(
                "File must be a spreadsheet (.xlsx or .csv): {}",
                path.display()
            ))),
        }
    }
}

/// Non-text value of a workbook cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue {
    Number(f64),
    Bool(bool),
    /// Excel serial date (1900 system)
    DateTime(f64),
    /// Elapsed time in days
    Duration(f64),
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Cell {
    text: String,
    value: Option<CellValue>,
}

impl Cell {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            value: None,
        }
    }
}

/// In-memory table: a header row plus data rows of equal width
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Build a table of text cells. Short rows are padded to the header
    /// width; a row wider than the headers gets blank-named columns added
    /// rather than losing cells.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Cell::text).collect())
            .collect();
        Self::from_cells(headers, rows)
    }

    fn from_cells(mut headers: Vec<String>, mut rows: Vec<Vec<Cell>>) -> Self {
        let width = rows.iter().map(Vec::len).fold(headers.len(), usize::max);
        headers.resize(width, String::new());
        for row in &mut rows {
            row.resize(width, Cell::default());
        }
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Position of the first column with this exact header
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell text; empty for out-of-range coordinates
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(|c| c.text.as_str())
            .unwrap_or("")
    }

    /// Typed value of a workbook cell, if it has one
    pub fn value(&self, row: usize, column: usize) -> Option<CellValue> {
        self.rows.get(row)?.get(column)?.value
    }

    /// Overwrite a cell with text
    pub fn set_cell(&mut self, row: usize, column: usize, value: impl Into<String>) -> Result<()> {
        let len = self.rows.len();
        let cells = self
            .rows
            .get_mut(row)
            .ok_or(MutualsError::RowOutOfRange { index: row, len })?;
        let slot = cells.get_mut(column).ok_or_else(|| {
            MutualsError::Other(format!("Column {} out of range", column))
        })?;
        *slot = Cell::text(value);
        Ok(())
    }

    /// Non-empty values of a column, in row order
    pub fn non_empty_values(&self, column: usize) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .filter_map(move |r| r.get(column))
            .map(|c| c.text.as_str())
            .filter(|s| !is_null(s))
    }

    /// Insert an empty column at `position`, shifting later columns right
    pub fn insert_column(&mut self, position: usize, name: impl Into<String>) {
        let position = position.min(self.headers.len());
        self.headers.insert(position, name.into());
        for row in &mut self.rows {
            row.insert(position, Cell::default());
        }
    }

    /// Read a table from disk
    pub fn read(path: &Path) -> Result<Self> {
        match TableFormat::from_path(path)? {
            TableFormat::Csv => read_csv(path),
            TableFormat::Xlsx => read_xlsx(path),
        }
    }

    /// Serialize into the bytes of the given format
    pub fn encode(&self, format: TableFormat) -> Result<Vec<u8>> {
        match format {
            TableFormat::Csv => self.encode_csv(),
            TableFormat::Xlsx => self.encode_xlsx(),
        }
    }

    /// Atomically replace `path` with this table
    pub fn write(&self, path: &Path) -> Result<()> {
        let bytes = self.encode(TableFormat::from_path(path)?)?;
        let dir = parent_dir(path);

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| {
            MutualsError::persistence(format!("Cannot create temp file in {}: {}", dir.display(), e))
        })?;
        tmp.write_all(&bytes)
            .and_then(|_| tmp.flush())
            .map_err(|e| MutualsError::persistence(format!("Failed writing temp file: {}", e)))?;
        tmp.persist(path).map_err(|e| {
            MutualsError::persistence(format!("Failed to replace {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    fn encode_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(&self.headers)
            .map_err(|e| MutualsError::persistence(format!("CSV encode failed: {}", e)))?;
        for row in &self.rows {
            writer
                .write_record(row.iter().map(|c| c.text.as_str()))
                .map_err(|e| MutualsError::persistence(format!("CSV encode failed: {}", e)))?;
        }
        writer
            .into_inner()
            .map_err(|e| MutualsError::persistence(format!("CSV encode failed: {}", e)))
    }

    fn encode_xlsx(&self) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();

        for (col, header) in self.headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            sheet
                .write_string(0, col as u16, header.as_str())
                .map_err(xlsx_err)?;
        }
        for (r, row) in self.rows.iter().enumerate() {
            for (col, cell) in row.iter().enumerate() {
                write_cell(sheet, (r + 1) as u32, col as u16, cell)?;
            }
        }

        workbook.save_to_buffer().map_err(xlsx_err)
    }
}

fn xlsx_err(e: rust_xlsxwriter::XlsxError) -> MutualsError {
    MutualsError::persistence(format!("XLSX encode failed: {}", e))
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> Result<()> {
    let written = match cell.value {
        Some(CellValue::Number(n)) => sheet.write_number(row, col, n).map(|_| ()),
        Some(CellValue::Bool(b)) => sheet.write_boolean(row, col, b).map(|_| ()),
        Some(CellValue::DateTime(serial)) => {
            let pattern = if serial.fract() == 0.0 {
                "yyyy-mm-dd"
            } else {
                "yyyy-mm-dd hh:mm:ss"
            };
            let format = Format::new().set_num_format(pattern);
            sheet
                .write_number_with_format(row, col, serial, &format)
                .map(|_| ())
        }
        Some(CellValue::Duration(days)) => {
            let format = Format::new().set_num_format("[h]:mm:ss");
            sheet
                .write_number_with_format(row, col, days, &format)
                .map(|_| ())
        }
        None if cell.text.is_empty() => Ok(()),
        None => sheet.write_string(row, col, cell.text.as_str()).map(|_| ()),
    };
    written.map_err(xlsx_err)
}

/// Cells that pandas-style readers would treat as missing
pub fn is_null(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v.eq_ignore_ascii_case("nan") || v.eq_ignore_ascii_case("none")
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn read_csv(path: &Path) -> Result<Table> {
    let load_err = |e: csv::Error| {
        MutualsError::data_load(format!("Failed to read {}: {}", path.display(), e))
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(load_err)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(load_err)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.is_empty() {
        return Err(MutualsError::data_load(format!(
            "{} has no header row",
            path.display()
        )));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(load_err)?;
        if record.len() > headers.len() {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            return Err(MutualsError::data_load(format!(
                "{} line {}: expected {} fields, saw {}",
                path.display(),
                line,
                headers.len(),
                record.len()
            )));
        }
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }

    Ok(Table::new(headers, rows))
}

fn read_xlsx(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        MutualsError::data_load(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| MutualsError::data_load(format!("{} has no worksheets", path.display())))?
        .map_err(|e| {
            MutualsError::data_load(format!("Failed to read {}: {}", path.display(), e))
        })?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|c| workbook_cell(c).text.trim().to_string())
            .collect(),
        None => {
            return Err(MutualsError::data_load(format!(
                "{} has no header row",
                path.display()
            )))
        }
    };

    let body = rows
        .map(|row| row.iter().map(workbook_cell).collect::<Vec<_>>())
        .collect();

    Ok(Table::from_cells(headers, body))
}

fn workbook_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::default(),
        Data::String(s) => Cell::text(s.clone()),
        Data::Float(f) => Cell {
            text: number_text(*f),
            value: Some(CellValue::Number(*f)),
        },
        Data::Int(i) => Cell {
            text: i.to_string(),
            value: Some(CellValue::Number(*i as f64)),
        },
        Data::Bool(b) => Cell {
            text: b.to_string(),
            value: Some(CellValue::Bool(*b)),
        },
        Data::DateTime(dt) if dt.is_duration() => Cell {
            text: duration_text(dt.as_f64()),
            value: Some(CellValue::Duration(dt.as_f64())),
        },
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => Cell {
                text: datetime_text(&datetime),
                value: Some(CellValue::DateTime(excel_serial(&datetime))),
            },
            None => Cell {
                text: number_text(dt.as_f64()),
                value: Some(CellValue::Number(dt.as_f64())),
            },
        },
        Data::Error(e) => Cell::text(format!("{:?}", e)),
        other => Cell::text(other.to_string()),
    }
}

fn number_text(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

fn datetime_text(datetime: &NaiveDateTime) -> String {
    if datetime.num_seconds_from_midnight() == 0 {
        datetime.format("%Y-%m-%d").to_string()
    } else {
        datetime.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

fn duration_text(days: f64) -> String {
    let total = (days * 86_400.0).round() as i64;
    format!("{}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

/// Days since the 1900-system epoch, valid from March 1900 on
fn excel_serial(datetime: &NaiveDateTime) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    let millis = datetime.signed_duration_since(epoch).num_milliseconds();
    millis as f64 / 86_400_000.0
}
