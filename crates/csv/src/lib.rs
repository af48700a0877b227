//! CSV backend for timetable extraction.
//!
//! Reads a CSV export of the schedule sheet. A CSV file has exactly one
//! sheet, so the requested sheet name only labels the result.

pub mod reader;

pub use reader::CsvReader;
