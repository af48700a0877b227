//! Domain types for raw schedule sheets and extracted teacher records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The format of the uploaded schedule file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    /// Office Open XML workbook.
    Xlsx,
    /// Comma-separated export of the schedule sheet.
    Csv,
}

impl SourceFormat {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "xlsx" | "xlsm" => Some(Self::Xlsx),
            "csv" | "txt" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Detect format from file magic bytes.
    ///
    /// Only XLSX has a signature; CSV has to be recognized by extension.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        // XLSX is a ZIP file (PK\x03\x04)
        if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
            return Some(Self::Xlsx);
        }

        None
    }

    /// Detect format from magic bytes first, then from the file name's extension.
    pub fn detect(bytes: &[u8], filename: &str) -> Option<Self> {
        Self::from_magic(bytes).or_else(|| {
            filename
                .rsplit_once('.')
                .and_then(|(_, ext)| Self::from_extension(ext))
        })
    }
}

/// A single cell value as read from the source sheet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum RawCell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl RawCell {
    /// Build a cell from free text, mapping blank strings to `Empty`.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            Self::Empty
        } else {
            Self::Text(text)
        }
    }

    /// True for `Empty` and for text that is only whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Borrow the cell's text, if it is a text cell.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Render the cell as display text. Whole numbers print without a
    /// fractional part, the way a spreadsheet shows them.
    pub fn to_display(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Text(s) => Some(s.clone()),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Self::Number(n) => Some(n.to_string()),
            Self::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
        }
    }
}

static EMPTY_CELL: RawCell = RawCell::Empty;

/// A worksheet read from the source file, as rows of raw cells.
///
/// Rows may be ragged; any cell outside the stored data reads as `Empty`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSheet {
    /// Worksheet name (the file name for CSV sources).
    pub name: String,

    /// Rows in sheet order.
    pub rows: Vec<Vec<RawCell>>,
}

impl RawSheet {
    /// Create an empty sheet with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    /// Build a sheet from rows of strings. Blank strings become `Empty`.
    pub fn from_text_rows<S: AsRef<str>>(name: impl Into<String>, rows: &[Vec<S>]) -> Self {
        Self {
            name: name.into(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|c| RawCell::from_text(c.as_ref())).collect())
                .collect(),
        }
    }

    /// Set a cell, growing the grid as needed.
    pub fn set(&mut self, row: usize, col: usize, value: RawCell) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, RawCell::Empty);
        }
        cells[col] = value;
    }

    /// Read a cell; out-of-range positions are `Empty`.
    pub fn cell(&self, row: usize, col: usize) -> &RawCell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// A normalized class code: uppercase letters only, at least three of them.
///
/// Construct through [`crate::ClassNormalizer`] or [`ClassCode::parse`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassCode(String);

impl ClassCode {
    /// Wrap a string that has already passed the class-code rule.
    pub(crate) fn from_normalized(code: String) -> Self {
        Self(code)
    }

    /// Apply the base class-code rule (no alias table) to a raw label.
    pub fn parse(raw: &str) -> Option<Self> {
        crate::normalize::canonical_form(raw).map(Self)
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClassCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One teacher's row from the schedule sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherRecord {
    /// Teacher name as written in the sheet, trimmed.
    pub name: String,

    /// Designation column (e.g. "PGT"); carried for the summary sheet only.
    pub designation: Option<String>,

    /// Subject taught.
    pub subject: String,

    /// Class code per period slot, day-major. `None` is a free period.
    pub periods: Vec<Option<ClassCode>>,
}

impl TeacherRecord {
    /// Class at a slot offset, or `None` for a free or out-of-range slot.
    pub fn class_at(&self, offset: usize) -> Option<&ClassCode> {
        self.periods.get(offset).and_then(Option::as_ref)
    }

    /// Number of slots with a class assigned.
    pub fn assigned_count(&self) -> usize {
        self.periods.iter().filter(|p| p.is_some()).count()
    }

    /// Number of free slots.
    pub fn free_count(&self) -> usize {
        self.periods.len() - self.assigned_count()
    }

    /// Subject abbreviation: the first `len` characters of the subject.
    pub fn subject_abbreviation(&self, len: usize) -> String {
        self.subject.chars().take(len).collect()
    }
}

/// Result of extracting one schedule sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    /// Teacher records in sheet order.
    pub teachers: Vec<TeacherRecord>,

    /// Distinct class codes found in any record, sorted ascending.
    pub classes: Vec<ClassCode>,
}

impl Extraction {
    /// True when no teacher rows were found.
    pub fn is_empty(&self) -> bool {
        self.teachers.is_empty()
    }
}
