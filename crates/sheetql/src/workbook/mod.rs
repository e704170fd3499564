//! Spreadsheet containers read into named sheets of header-addressed rows.

pub mod cell;
mod xlsx;
mod xml;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use cell::CellValue;
pub use xlsx::{XlsxError, XlsxReader};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("spreadsheet not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("spreadsheet unreadable: {}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: XlsxError,
    },

    #[error("sheet `{sheet}` does not exist in {}", path.display())]
    UnknownSheet { path: PathBuf, sheet: String },
}

/// A source of named sheets, read one sheet at a time.
pub trait TabularSource {
    /// Sheet names in file order.
    fn sheet_names(&self) -> Vec<String>;

    fn read_sheet(&mut self, name: &str) -> Result<Sheet, SourceError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    pub path: PathBuf,
    pub sheets: Vec<Sheet>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    /// Header names in file order; empty when the sheet has no non-empty cell.
    pub columns: Vec<String>,
    /// Data rows, each exactly `columns.len()` wide; `row[i]` is the value
    /// under `columns[i]`.
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    #[must_use]
    pub fn has_header(&self) -> bool {
        !self.columns.is_empty()
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Every value of one column, top to bottom.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows.iter().filter_map(move |row| row.get(index))
    }
}

impl Workbook {
    #[must_use]
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|sheet| sheet.name.as_str()).collect()
    }

    #[must_use]
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }
}

/// Reads every sheet of `source` in file order.
pub fn read_all_sheets(
    path: &Path,
    source: &mut impl TabularSource,
) -> Result<Workbook, SourceError> {
    let mut sheets = Vec::new();
    for name in source.sheet_names() {
        sheets.push(source.read_sheet(&name)?);
    }

    Ok(Workbook {
        path: path.to_path_buf(),
        sheets,
    })
}

/// Opens the spreadsheet at `path` and reads all of its sheets.
pub fn open_workbook(path: &Path) -> Result<Workbook, SourceError> {
    let mut reader = XlsxReader::open(path)?;
    read_all_sheets(path, &mut reader)
}

#[cfg(test)]
mod tests {
    use super::{CellValue, Sheet};

    #[test]
    fn column_values_follow_header_positions_top_to_bottom() {
        let sheet = Sheet::new(
            "Camp East",
            vec!["Name".to_string(), "Channel".to_string()],
            vec![
                vec![CellValue::Text("Door 109".to_string()), CellValue::Number(3.0)],
                vec![CellValue::Text("Gate".to_string()), CellValue::Empty],
            ],
        );

        let channels = sheet.column_values(1).collect::<Vec<_>>();
        assert_eq!(channels, vec![&CellValue::Number(3.0), &CellValue::Empty]);
        assert_eq!(sheet.column_values(2).count(), 0);
    }

    #[test]
    fn sheet_without_columns_has_no_header() {
        let sheet = Sheet::new("Blank", Vec::new(), Vec::new());
        assert!(!sheet.has_header());
        assert_eq!(sheet.row_count(), 0);
    }
}
