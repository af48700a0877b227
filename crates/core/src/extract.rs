//! Teacher-row extraction from a raw schedule sheet.

use crate::{
    ClassCode, ClassNormalizer, ColumnLayout, Extraction, GridLayout, RawCell, RawSheet,
    TeacherRecord,
};
use std::collections::BTreeSet;

/// Minimum characters in a name cell for the row to count as a teacher.
const MIN_NAME_LEN: usize = 2;

/// Extracts teacher records and the class list from a schedule sheet.
#[derive(Debug, Clone, Default)]
pub struct TimetableExtractor {
    grid: GridLayout,
    columns: ColumnLayout,
    normalizer: ClassNormalizer,
}

impl TimetableExtractor {
    /// Create an extractor with the default layout and no aliases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different weekly grid.
    pub fn with_grid(mut self, grid: GridLayout) -> Self {
        self.grid = grid;
        self
    }

    /// Use a different source column layout.
    pub fn with_columns(mut self, columns: ColumnLayout) -> Self {
        self.columns = columns;
        self
    }

    /// Use a configured class normalizer (e.g. with an alias table).
    pub fn with_normalizer(mut self, normalizer: ClassNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn grid(&self) -> &GridLayout {
        &self.grid
    }

    pub fn normalizer(&self) -> &ClassNormalizer {
        &self.normalizer
    }

    /// Extract every teacher row and the sorted set of classes they teach.
    pub fn extract(&self, sheet: &RawSheet) -> Extraction {
        let mut teachers = Vec::new();
        let mut classes = BTreeSet::new();
        let mut skipped = 0usize;

        for row in 0..sheet.row_count() {
            let Some(name) = self.teacher_name(sheet.cell(row, self.columns.name_column)) else {
                skipped += 1;
                continue;
            };

            let record = self.build_record(sheet, row, name);
            classes.extend(record.periods.iter().flatten().cloned());
            teachers.push(record);
        }

        log::debug!(
            "Sheet '{}': {} teacher rows, {} skipped, {} classes",
            sheet.name,
            teachers.len(),
            skipped,
            classes.len()
        );
        if teachers.is_empty() {
            // Callers warn with their own context (file path, upload name).
            log::debug!("No teacher rows found in sheet '{}'", sheet.name);
        }

        Extraction {
            teachers,
            classes: classes.into_iter().collect(),
        }
    }

    /// The trimmed name if this cell starts a teacher row.
    fn teacher_name(&self, cell: &RawCell) -> Option<String> {
        let name = cell.as_text()?.trim();
        if name.chars().count() < MIN_NAME_LEN || self.columns.is_header_token(name) {
            return None;
        }
        Some(name.to_string())
    }

    fn build_record(&self, sheet: &RawSheet, row: usize, name: String) -> TeacherRecord {
        let designation = sheet
            .cell(row, self.columns.designation_column)
            .to_display()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let subject = sheet
            .cell(row, self.columns.subject_column)
            .to_display()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| name.chars().take(self.columns.subject_fallback_len).collect());

        TeacherRecord {
            periods: self.build_periods(sheet, row),
            name,
            designation,
            subject,
        }
    }

    /// Read exactly one grid's worth of period cells; missing cells are free.
    fn build_periods(&self, sheet: &RawSheet, row: usize) -> Vec<Option<ClassCode>> {
        let first = self.columns.first_period_column;
        (0..self.grid.slot_count())
            .map(|offset| self.normalizer.normalize_cell(sheet.cell(row, first + offset)))
            .collect()
    }
}
