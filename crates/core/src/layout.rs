//! Grid dimensions and source column layout.
//!
//! The defaults match the six-day, eight-period sheet the school office
//! exports. Other layouts go through the builders rather than code edits.

use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Worksheet holding the teacher schedule in the source workbook.
pub const DEFAULT_SHEET_NAME: &str = "SCHOOL TIMETABLE";

/// Day labels, Monday to Saturday.
pub const DEFAULT_DAYS: [&str; 6] = ["MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Teaching periods per day.
pub const DEFAULT_PERIODS_PER_DAY: usize = 8;

/// Most periods per day: one worksheet row holds the label column plus one
/// column per period, up to column XFD.
pub const MAX_PERIODS_PER_DAY: usize = 16_383;

/// 0-based column holding the teacher name.
pub const NAME_COLUMN: usize = 1;

/// 0-based column holding the designation.
pub const DESIGNATION_COLUMN: usize = 2;

/// 0-based column holding the subject.
pub const SUBJECT_COLUMN: usize = 3;

/// 0-based column of the first period cell.
pub const FIRST_PERIOD_COLUMN: usize = 4;

/// Characters of the subject shown in class-view cells.
pub const DEFAULT_ABBREVIATION_LEN: usize = 3;

/// Name-column values that mark a header row rather than a teacher.
pub const DEFAULT_HEADER_TOKENS: [&str; 6] = [
    "NAME OF TR",
    "NAME OF TEACHER",
    "NAME OF THE TEACHER",
    "TEACHER NAME",
    "TEACHER",
    "NAME",
];

static WHITESPACE_RUN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Uppercase, trim, and collapse whitespace runs to single spaces.
fn fold_token(text: &str) -> String {
    WHITESPACE_RUN_REGEX
        .replace_all(text.trim(), " ")
        .trim_end_matches('.')
        .to_uppercase()
}

/// Days and periods of the weekly grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GridLayoutFields")]
pub struct GridLayout {
    days: Vec<String>,
    periods_per_day: usize,
}

/// Unchecked serialized form; deserializing goes through [`GridLayout::try_new`].
#[derive(Deserialize)]
struct GridLayoutFields {
    days: Vec<String>,
    periods_per_day: usize,
}

impl TryFrom<GridLayoutFields> for GridLayout {
    type Error = Error;

    fn try_from(fields: GridLayoutFields) -> Result<Self> {
        Self::try_new(fields.days, fields.periods_per_day)
    }
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            days: DEFAULT_DAYS.iter().map(|d| d.to_string()).collect(),
            periods_per_day: DEFAULT_PERIODS_PER_DAY,
        }
    }
}

impl GridLayout {
    /// Create the default 6 × 8 layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a layout, rejecting zero days and rejecting zero periods or
    /// more than [`MAX_PERIODS_PER_DAY`].
    pub fn try_new<I, S>(days: I, periods_per_day: usize) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let days: Vec<String> = days.into_iter().map(Into::into).collect();
        if days.is_empty() {
            return Err(Error::InvalidLayout("at least one day is required".into()));
        }
        if periods_per_day == 0 {
            return Err(Error::InvalidLayout(
                "at least one period per day is required".into(),
            ));
        }
        if periods_per_day > MAX_PERIODS_PER_DAY {
            return Err(Error::InvalidLayout(format!(
                "{} periods per day exceed the limit of {}",
                periods_per_day, MAX_PERIODS_PER_DAY
            )));
        }
        Ok(Self {
            days,
            periods_per_day,
        })
    }

    /// Day labels in order.
    pub fn days(&self) -> &[String] {
        &self.days
    }

    /// Number of days.
    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    /// Periods per day.
    pub fn periods_per_day(&self) -> usize {
        self.periods_per_day
    }

    /// Total number of slots in a teacher's week.
    pub fn slot_count(&self) -> usize {
        self.days.len() * self.periods_per_day
    }

    /// Offset of a (day, period) slot in a period sequence.
    pub fn offset(&self, day: usize, period: usize) -> Option<usize> {
        if day < self.days.len() && period < self.periods_per_day {
            Some(day * self.periods_per_day + period)
        } else {
            None
        }
    }

    /// Inverse of [`GridLayout::offset`].
    pub fn slot(&self, offset: usize) -> Option<(usize, usize)> {
        if offset < self.slot_count() {
            Some((offset / self.periods_per_day, offset % self.periods_per_day))
        } else {
            None
        }
    }

    /// Period header labels, `P1..Pn`.
    pub fn period_labels(&self) -> Vec<String> {
        (1..=self.periods_per_day).map(|p| format!("P{}", p)).collect()
    }
}

/// Where each field lives in a source row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLayout {
    pub name_column: usize,
    pub designation_column: usize,
    pub subject_column: usize,
    pub first_period_column: usize,
    /// Characters of the name used as subject when the subject cell is blank.
    pub subject_fallback_len: usize,
    header_tokens: Vec<String>,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            name_column: NAME_COLUMN,
            designation_column: DESIGNATION_COLUMN,
            subject_column: SUBJECT_COLUMN,
            first_period_column: FIRST_PERIOD_COLUMN,
            subject_fallback_len: DEFAULT_ABBREVIATION_LEN,
            header_tokens: DEFAULT_HEADER_TOKENS.iter().map(|t| fold_token(t)).collect(),
        }
    }
}

impl ColumnLayout {
    /// Create the default column layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the header-token list.
    pub fn with_header_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.header_tokens = tokens.into_iter().map(|t| fold_token(t.as_ref())).collect();
        self
    }

    /// Set the length of the name prefix used as a fallback subject.
    pub fn with_subject_fallback_len(mut self, len: usize) -> Self {
        self.subject_fallback_len = len.max(1);
        self
    }

    /// True if the name cell text is a column header such as "NAME OF TR".
    pub fn is_header_token(&self, name: &str) -> bool {
        let folded = fold_token(name);
        self.header_tokens.iter().any(|t| *t == folded)
    }
}
