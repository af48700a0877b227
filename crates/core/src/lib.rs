//! Core domain types, class-label normalization, and timetable aggregation
//! for school schedule sheets.

pub mod cache;
pub mod error;
pub mod extract;
pub mod layout;
pub mod normalize;
pub mod types;
pub mod views;

pub use cache::{ExtractionCache, Fingerprint, DEFAULT_CACHE_CAPACITY};
pub use error::{Error, Result};
pub use extract::TimetableExtractor;
pub use layout::{
    ColumnLayout, GridLayout, DEFAULT_ABBREVIATION_LEN, DEFAULT_DAYS, DEFAULT_PERIODS_PER_DAY,
    DEFAULT_SHEET_NAME, MAX_PERIODS_PER_DAY,
};
pub use normalize::{AliasTable, ClassNormalizer};
pub use types::{ClassCode, Extraction, RawCell, RawSheet, SourceFormat, TeacherRecord};
pub use views::{
    merge_classes, output_file_name, ClassView, ScheduleGrid, TeacherView, Timetable,
    TimetableMetrics, ViewBuilder,
};
