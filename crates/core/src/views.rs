//! Teacher-indexed and class-indexed timetable views.
//!
//! The teacher view is a straight reshape of each record's period sequence
//! into a day × period grid. The class view inverts it: for every class and
//! slot it lists the subject abbreviations of all teachers scheduled there,
//! in teacher order. Double bookings are shown, not flagged.

use crate::{ClassCode, ClassNormalizer, Extraction, GridLayout, DEFAULT_ABBREVIATION_LEN};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Separator between subject abbreviations in a class-view cell.
pub const DEFAULT_SUBJECT_SEPARATOR: &str = "/";

/// A day × period grid of display strings. Empty string is a free slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleGrid {
    periods_per_day: usize,
    cells: Vec<String>,
}

impl ScheduleGrid {
    fn new(grid: &GridLayout, cells: Vec<String>) -> Self {
        debug_assert_eq!(cells.len(), grid.slot_count());
        Self {
            periods_per_day: grid.periods_per_day(),
            cells,
        }
    }

    /// Cell text at (day, period); out-of-range slots read as free.
    pub fn get(&self, day: usize, period: usize) -> &str {
        if period >= self.periods_per_day {
            return "";
        }
        self.cells
            .get(day * self.periods_per_day + period)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// One slice of cells per day.
    ///
    /// A grid deserialized with zero periods per day is read as one period.
    pub fn days(&self) -> impl Iterator<Item = &[String]> {
        self.cells.chunks(self.periods_per_day.max(1))
    }

    /// Number of non-empty cells.
    pub fn filled_count(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_empty()).count()
    }
}

/// One teacher's weekly grid of classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherView {
    pub name: String,
    pub designation: Option<String>,
    pub subject: String,
    pub grid: ScheduleGrid,
    pub assigned: usize,
    pub free: usize,
}

/// One class's weekly grid of subjects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassView {
    pub class: ClassCode,
    pub grid: ScheduleGrid,
}

/// Counts shown to the user after analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableMetrics {
    pub teachers: usize,
    pub classes: usize,
    pub assigned_slots: usize,
    pub free_slots: usize,
}

impl TimetableMetrics {
    /// Compute metrics for an extraction and its final class list.
    pub fn from_extraction(extraction: &Extraction, class_count: usize) -> Self {
        let assigned_slots = extraction.teachers.iter().map(|t| t.assigned_count()).sum();
        let free_slots = extraction.teachers.iter().map(|t| t.free_count()).sum();
        Self {
            teachers: extraction.teachers.len(),
            classes: class_count,
            assigned_slots,
            free_slots,
        }
    }
}

/// Both views of one school's timetable, ready to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timetable {
    pub school_name: String,
    pub days: Vec<String>,
    pub period_labels: Vec<String>,
    pub teachers: Vec<TeacherView>,
    pub classes: Vec<ClassView>,
    pub metrics: TimetableMetrics,
}

impl Timetable {
    /// Download file name for this timetable generated at `at`.
    pub fn file_name(&self, at: NaiveDateTime) -> String {
        output_file_name(&self.school_name, at)
    }
}

/// `Timetable_{school}_{YYYYmmdd_HHMMSS}.xlsx`, spaces in the school name
/// replaced by underscores.
pub fn output_file_name(school_name: &str, at: NaiveDateTime) -> String {
    format!(
        "Timetable_{}_{}.xlsx",
        school_name.trim().replace(' ', "_"),
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Union of found and expected class lists, sorted, duplicates collapsed.
///
/// Expected entries go through the same normalizer as sheet cells, so an
/// aliased spelling lands on the same code. Unusable entries are dropped.
pub fn merge_classes<S: AsRef<str>>(
    found: &[ClassCode],
    expected: &[S],
    normalizer: &ClassNormalizer,
) -> Vec<ClassCode> {
    let mut merged: BTreeSet<ClassCode> = found.iter().cloned().collect();
    for raw in expected {
        match normalizer.normalize_label(raw.as_ref()) {
            Some(code) => {
                merged.insert(code);
            }
            None => log::warn!("Ignoring expected class '{}': not a class code", raw.as_ref()),
        }
    }
    merged.into_iter().collect()
}

/// Builds [`Timetable`] views from an extraction.
#[derive(Debug, Clone)]
pub struct ViewBuilder {
    grid: GridLayout,
    normalizer: ClassNormalizer,
    expected_classes: Vec<String>,
    abbreviation_len: usize,
    separator: String,
}

impl Default for ViewBuilder {
    fn default() -> Self {
        Self {
            grid: GridLayout::default(),
            normalizer: ClassNormalizer::default(),
            expected_classes: Vec::new(),
            abbreviation_len: DEFAULT_ABBREVIATION_LEN,
            separator: DEFAULT_SUBJECT_SEPARATOR.to_string(),
        }
    }
}

impl ViewBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Must match the grid the extraction was built with.
    pub fn with_grid(mut self, grid: GridLayout) -> Self {
        self.grid = grid;
        self
    }

    /// Normalizer applied to the expected class list.
    pub fn with_normalizer(mut self, normalizer: ClassNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Classes to show even when no teacher is scheduled for them.
    pub fn with_expected_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_classes = classes.into_iter().map(Into::into).collect();
        self
    }

    /// Characters of the subject shown in class-view cells (at least 1).
    pub fn with_abbreviation_len(mut self, len: usize) -> Self {
        self.abbreviation_len = len.max(1);
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Build both views.
    pub fn build(&self, school_name: &str, extraction: &Extraction) -> Timetable {
        let classes = merge_classes(&extraction.classes, &self.expected_classes, &self.normalizer);

        let teachers: Vec<TeacherView> = extraction
            .teachers
            .iter()
            .map(|t| {
                let cells = (0..self.grid.slot_count())
                    .map(|offset| t.class_at(offset).map(ClassCode::to_string).unwrap_or_default())
                    .collect();
                TeacherView {
                    name: t.name.clone(),
                    designation: t.designation.clone(),
                    subject: t.subject.clone(),
                    grid: ScheduleGrid::new(&self.grid, cells),
                    assigned: t.assigned_count(),
                    free: t.free_count(),
                }
            })
            .collect();

        let class_views: Vec<ClassView> = classes
            .iter()
            .map(|class| ClassView {
                class: class.clone(),
                grid: ScheduleGrid::new(&self.grid, self.class_cells(class, extraction)),
            })
            .collect();

        log::debug!(
            "Built views for '{}': {} teachers, {} classes",
            school_name,
            teachers.len(),
            class_views.len()
        );

        Timetable {
            school_name: school_name.to_string(),
            days: self.grid.days().to_vec(),
            period_labels: self.grid.period_labels(),
            metrics: TimetableMetrics::from_extraction(extraction, class_views.len()),
            teachers,
            classes: class_views,
        }
    }

    fn class_cells(&self, class: &ClassCode, extraction: &Extraction) -> Vec<String> {
        (0..self.grid.slot_count())
            .map(|offset| {
                extraction
                    .teachers
                    .iter()
                    .filter(|t| t.class_at(offset) == Some(class))
                    .map(|t| t.subject_abbreviation(self.abbreviation_len))
                    .collect::<Vec<_>>()
                    .join(&self.separator)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AliasTable, TeacherRecord};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn teacher(name: &str, subject: &str, slots: &[(usize, &str)]) -> TeacherRecord {
        let mut periods = vec![None; 48];
        for (offset, class) in slots {
            periods[*offset] = ClassCode::parse(class);
        }
        TeacherRecord {
            name: name.to_string(),
            designation: None,
            subject: subject.to_string(),
            periods,
        }
    }

    fn extraction(teachers: Vec<TeacherRecord>) -> Extraction {
        let classes: BTreeSet<ClassCode> = teachers
            .iter()
            .flat_map(|t| t.periods.iter().flatten().cloned())
            .collect();
        Extraction {
            teachers,
            classes: classes.into_iter().collect(),
        }
    }

    #[test]
    fn test_teacher_view_reshapes_periods() {
        let ex = extraction(vec![teacher("Mr. Rao", "Maths", &[(0, "VIA"), (9, "VIB"), (47, "VIA")])]);
        let timetable = ViewBuilder::new().build("JNV", &ex);

        let grid = &timetable.teachers[0].grid;
        assert_eq!(grid.get(0, 0), "VIA");
        assert_eq!(grid.get(1, 1), "VIB");
        assert_eq!(grid.get(5, 7), "VIA");
        assert_eq!(grid.get(2, 3), "");
        assert_eq!(grid.days().count(), 6);
        assert_eq!(timetable.teachers[0].assigned, 3);
        assert_eq!(timetable.teachers[0].free, 45);
    }

    #[test]
    fn test_class_view_joins_subjects_in_teacher_order() {
        let ex = extraction(vec![
            teacher("Mr. Rao", "Maths", &[(0, "VIA")]),
            teacher("Ms. Devi", "English", &[(0, "VIA"), (1, "VIB")]),
        ]);
        let timetable = ViewBuilder::new().build("JNV", &ex);

        let codes: Vec<&str> = timetable.classes.iter().map(|c| c.class.as_str()).collect();
        assert_eq!(codes, vec!["VIA", "VIB"]);

        let via = &timetable.classes[0].grid;
        assert_eq!(via.get(0, 0), "Mat/Eng");
        assert_eq!(via.get(0, 1), "");
        assert_eq!(timetable.classes[1].grid.get(0, 1), "Eng");
        assert_eq!(via.filled_count(), 1);
    }

    #[test]
    fn test_abbreviation_length_and_separator() {
        let ex = extraction(vec![
            teacher("A. Das", "Science", &[(3, "IXA")]),
            teacher("B. Sen", "Hindi", &[(3, "IXA")]),
        ]);
        let timetable = ViewBuilder::new()
            .with_abbreviation_len(4)
            .with_separator(", ")
            .build("JNV", &ex);
        assert_eq!(timetable.classes[0].grid.get(0, 3), "Scie, Hind");
    }

    #[test]
    fn test_expected_classes_are_merged_with_set_semantics() {
        let ex = extraction(vec![teacher("Mr. Rao", "Maths", &[(0, "VIB")])]);
        let normalizer = ClassNormalizer::new()
            .with_aliases(AliasTable::from_pairs([("SIXB", "VIB")]).unwrap());
        let timetable = ViewBuilder::new()
            .with_normalizer(normalizer)
            .with_expected_classes(["vi a", "SIX B", "VIB", "12", "XI"])
            .build("JNV", &ex);

        let codes: Vec<&str> = timetable.classes.iter().map(|c| c.class.as_str()).collect();
        assert_eq!(codes, vec!["VIA", "VIB"]);
        // Expected-only class renders as an empty grid.
        assert_eq!(timetable.classes[0].grid.filled_count(), 0);
        assert_eq!(timetable.metrics.classes, 2);
    }

    #[test]
    fn test_empty_extraction_builds_empty_views() {
        let timetable = ViewBuilder::new().build("JNV", &Extraction::default());
        assert!(timetable.teachers.is_empty());
        assert!(timetable.classes.is_empty());
        assert_eq!(timetable.metrics, TimetableMetrics::default());
        assert_eq!(timetable.days.len(), 6);
        assert_eq!(timetable.period_labels.len(), 8);
    }

    #[test]
    fn test_metrics_count_slots() {
        let ex = extraction(vec![
            teacher("Mr. Rao", "Maths", &[(0, "VIA"), (1, "VIA")]),
            teacher("Ms. Devi", "English", &[(2, "VIB")]),
        ]);
        let metrics = ViewBuilder::new().build("JNV", &ex).metrics;
        assert_eq!(
            metrics,
            TimetableMetrics {
                teachers: 2,
                classes: 2,
                assigned_slots: 3,
                free_slots: 93,
            }
        );
    }

    #[test]
    fn test_output_file_name() {
        let at = NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(9, 5, 3)
            .unwrap();
        assert_eq!(
            output_file_name("Jawahar Navodaya Vidyalaya Baksa", at),
            "Timetable_Jawahar_Navodaya_Vidyalaya_Baksa_20240701_090503.xlsx"
        );
    }

    #[test]
    fn test_grid_out_of_range_is_free() {
        let ex = extraction(vec![teacher("Mr. Rao", "Maths", &[(0, "VIA")])]);
        let timetable = ViewBuilder::new().build("JNV", &ex);
        assert_eq!(timetable.teachers[0].grid.get(0, 8), "");
        assert_eq!(timetable.teachers[0].grid.get(6, 0), "");
    }

    #[test]
    fn test_deserialized_grid_without_periods_does_not_panic() {
        let grid: ScheduleGrid =
            serde_json::from_str(r#"{"periods_per_day":0,"cells":["VIA","",""]}"#).unwrap();
        assert_eq!(grid.days().count(), 3);
        assert_eq!(grid.get(0, 0), "");
        assert_eq!(grid.filled_count(), 1);
    }
}
