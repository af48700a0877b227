//! XLSX (Office Open XML) backend for timetable extraction.
//!
//! Reads the teacher schedule worksheet from an uploaded workbook and writes
//! the styled teacher/class timetable workbook.

pub mod reader;
pub mod writer;

pub use reader::XlsxReader;
pub use writer::{
    Palette, TimetableRenderer, CLASS_SHEET_NAME, SUMMARY_SHEET_NAME, TEACHER_SHEET_NAME,
};
