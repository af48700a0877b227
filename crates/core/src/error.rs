//! Error types for timetable extraction and rendering.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading a schedule sheet or rendering a timetable.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open or read the input file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The file format is not supported or could not be detected.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// Failed to read the XLSX workbook structure.
    #[error("XLSX read error: {0}")]
    XlsxReadError(String),

    /// Failed to read a CSV export.
    #[error("CSV read error: {0}")]
    CsvReadError(String),

    /// The requested worksheet does not exist in the workbook.
    #[error("Worksheet '{name}' not found (available: {available})")]
    SheetNotFound { name: String, available: String },

    /// ZIP archive error (for XLSX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing error (for XLSX).
    #[error("XML parsing error: {0}")]
    XmlError(String),

    /// An alias table entry could not be accepted.
    #[error("Invalid class alias: {0}")]
    InvalidAlias(String),

    /// The grid or column layout is unusable.
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    /// Failed to build the output workbook.
    #[error("Render error: {0}")]
    RenderError(String),
}
