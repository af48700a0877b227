//! Styled timetable workbook output.
//!
//! Produces three worksheets:
//!
//! ```text
//! Teacher Timetable         Class Timetable          Summary
//! | JNV Baksa            |  | JNV Baksa            |  | JNV Baksa          |
//! |                      |  |                      |  | Teachers   | 42    |
//! | Mr. Rao (Maths)      |  | Class VIA            |  | ...                |
//! | Day/Period | P1 | .. |  | Day/Period | P1 | .. |  | Teacher | Subject  |
//! | MON        | VIA| .. |  | MON        |Mat/Eng|  |  | Mr. Rao | Maths    |
//! ```

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};
use timetable_core::{Error, Result, ScheduleGrid, Timetable, MAX_PERIODS_PER_DAY};

pub const TEACHER_SHEET_NAME: &str = "Teacher Timetable";
pub const CLASS_SHEET_NAME: &str = "Class Timetable";
pub const SUMMARY_SHEET_NAME: &str = "Summary";

/// Fill colors, as 0xRRGGBB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub school: u32,
    pub class_header: u32,
    pub teacher_header: u32,
    pub day: u32,
    pub period: u32,
    pub data_cell: u32,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            school: 0x2E8B57,
            class_header: 0x32CD32,
            teacher_header: 0xFFD700,
            day: 0x1E90FF,
            period: 0x4169E1,
            data_cell: 0xE0F2F1,
        }
    }
}

/// Cell formats shared by all sheets.
struct TimetableFormats {
    banner: Format,
    teacher_header: Format,
    class_header: Format,
    corner: Format,
    period_header: Format,
    day: Format,
    data: Format,
    summary_label: Format,
    summary_text: Format,
    summary_number: Format,
}

/// Column widths and row heights of one timetable sheet.
struct SheetGeometry {
    label_width: f64,
    period_width: f64,
    block_header_height: f64,
}

const TEACHER_GEOMETRY: SheetGeometry = SheetGeometry {
    label_width: 25.0,
    period_width: 12.0,
    block_header_height: 45.0,
};

const CLASS_GEOMETRY: SheetGeometry = SheetGeometry {
    label_width: 20.0,
    period_width: 14.0,
    block_header_height: 35.0,
};

const BANNER_HEIGHT: f64 = 40.0;
const DAY_ROW_HEIGHT: f64 = 25.0;

/// Renders a [`Timetable`] to XLSX bytes.
#[derive(Debug, Clone)]
pub struct TimetableRenderer {
    palette: Palette,
    include_summary: bool,
}

impl Default for TimetableRenderer {
    fn default() -> Self {
        Self {
            palette: Palette::default(),
            include_summary: true,
        }
    }
}

impl TimetableRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Leave out the Summary sheet.
    pub fn without_summary(mut self) -> Self {
        self.include_summary = false;
        self
    }

    /// Build the workbook and return its bytes.
    ///
    /// An empty timetable still yields both timetable sheets, each holding
    /// only the school banner.
    pub fn render(&self, timetable: &Timetable) -> Result<Vec<u8>> {
        let last_col = last_column(timetable)?;
        self.build(timetable, last_col)
            .map_err(|e| Error::RenderError(format!("Failed to create workbook: {}", e)))
    }

    fn build(
        &self,
        timetable: &Timetable,
        last_col: u16,
    ) -> std::result::Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let formats = self.create_formats();

        self.add_teacher_sheet(&mut workbook, timetable, last_col, &formats)?;
        self.add_class_sheet(&mut workbook, timetable, last_col, &formats)?;
        if self.include_summary {
            self.add_summary_sheet(&mut workbook, timetable, &formats)?;
        }

        let buffer = workbook.save_to_buffer()?;
        log::debug!(
            "Rendered '{}': {} teacher blocks, {} class blocks, {} bytes",
            timetable.school_name,
            timetable.teachers.len(),
            timetable.classes.len(),
            buffer.len()
        );
        Ok(buffer)
    }

    fn create_formats(&self) -> TimetableFormats {
        let p = &self.palette;
        let cell = |fill: u32, size: f64, bold: bool, white: bool| {
            let mut format = Format::new()
                .set_font_size(size)
                .set_background_color(Color::RGB(fill))
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter)
                .set_text_wrap()
                .set_border(FormatBorder::Thin);
            if bold {
                format = format.set_bold();
            }
            if white {
                format = format.set_font_color(Color::White);
            }
            format
        };

        TimetableFormats {
            banner: cell(p.school, 16.0, true, true),
            teacher_header: cell(p.teacher_header, 12.0, true, false),
            class_header: cell(p.class_header, 13.0, true, true),
            corner: cell(p.period, 11.0, true, true),
            period_header: cell(p.period, 10.0, true, true),
            day: cell(p.day, 11.0, true, true),
            data: cell(p.data_cell, 11.0, false, false),
            summary_label: Format::new()
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(Color::RGB(p.period))
                .set_border(FormatBorder::Thin),
            summary_text: Format::new().set_border(FormatBorder::Thin),
            summary_number: Format::new()
                .set_align(FormatAlign::Center)
                .set_border(FormatBorder::Thin),
        }
    }

    fn add_teacher_sheet(
        &self,
        workbook: &mut Workbook,
        timetable: &Timetable,
        last_col: u16,
        formats: &TimetableFormats,
    ) -> std::result::Result<(), XlsxError> {
        let sheet = workbook.add_worksheet();
        sheet.set_name(TEACHER_SHEET_NAME)?;
        setup_sheet(sheet, timetable, last_col, formats, &TEACHER_GEOMETRY)?;

        let mut row = 3;
        for teacher in &timetable.teachers {
            sheet.merge_range(
                row,
                0,
                row,
                last_col,
                &format!("{}\n({})", teacher.name, teacher.subject),
                &formats.teacher_header,
            )?;
            sheet.set_row_height(row, TEACHER_GEOMETRY.block_header_height)?;
            row += 2;
            row = write_grid(sheet, row, timetable, last_col, &teacher.grid, formats)?;
            row += 2;
        }

        Ok(())
    }

    fn add_class_sheet(
        &self,
        workbook: &mut Workbook,
        timetable: &Timetable,
        last_col: u16,
        formats: &TimetableFormats,
    ) -> std::result::Result<(), XlsxError> {
        let sheet = workbook.add_worksheet();
        sheet.set_name(CLASS_SHEET_NAME)?;
        setup_sheet(sheet, timetable, last_col, formats, &CLASS_GEOMETRY)?;

        let mut row = 3;
        for class in &timetable.classes {
            sheet.merge_range(
                row,
                0,
                row,
                last_col,
                &format!("Class {}", class.class),
                &formats.class_header,
            )?;
            sheet.set_row_height(row, CLASS_GEOMETRY.block_header_height)?;
            row += 2;
            row = write_grid(sheet, row, timetable, last_col, &class.grid, formats)?;
            row += 2;
        }

        Ok(())
    }

    fn add_summary_sheet(
        &self,
        workbook: &mut Workbook,
        timetable: &Timetable,
        formats: &TimetableFormats,
    ) -> std::result::Result<(), XlsxError> {
        let sheet = workbook.add_worksheet();
        sheet.set_name(SUMMARY_SHEET_NAME)?;
        sheet.set_column_width(0, 28)?;
        for col in 1..=4 {
            sheet.set_column_width(col, 14)?;
        }

        sheet.merge_range(0, 0, 0, 4, &timetable.school_name, &formats.banner)?;
        sheet.set_row_height(0, BANNER_HEIGHT)?;

        let metrics = &timetable.metrics;
        let counts = [
            ("Teachers", metrics.teachers),
            ("Classes", metrics.classes),
            ("Assigned periods", metrics.assigned_slots),
            ("Free periods", metrics.free_slots),
        ];
        let mut row = 2;
        for (label, count) in counts {
            sheet.write_string_with_format(row, 0, label, &formats.summary_label)?;
            sheet.write_number_with_format(row, 1, count as f64, &formats.summary_number)?;
            row += 1;
        }

        row += 1;
        let titles = ["Teacher", "Designation", "Subject", "Assigned", "Free"];
        for (col, title) in (0u16..).zip(titles) {
            sheet.write_string_with_format(row, col, title, &formats.summary_label)?;
        }
        row += 1;
        for teacher in &timetable.teachers {
            sheet.write_string_with_format(row, 0, &teacher.name, &formats.summary_text)?;
            sheet.write_string_with_format(
                row,
                1,
                teacher.designation.as_deref().unwrap_or(""),
                &formats.summary_text,
            )?;
            sheet.write_string_with_format(row, 2, &teacher.subject, &formats.summary_text)?;
            sheet.write_number_with_format(row, 3, teacher.assigned as f64, &formats.summary_number)?;
            sheet.write_number_with_format(row, 4, teacher.free as f64, &formats.summary_number)?;
            row += 1;
        }

        row += 1;
        sheet.write_string_with_format(row, 0, "Class", &formats.summary_label)?;
        sheet.write_string_with_format(row, 1, "Scheduled", &formats.summary_label)?;
        row += 1;
        for class in &timetable.classes {
            sheet.write_string_with_format(row, 0, class.class.as_str(), &formats.summary_text)?;
            sheet.write_number_with_format(
                row,
                1,
                class.grid.filled_count() as f64,
                &formats.summary_number,
            )?;
            row += 1;
        }

        Ok(())
    }
}

/// Last column of a block: the label column plus one per period.
///
/// Fails when the periods do not fit in one worksheet row.
fn last_column(timetable: &Timetable) -> Result<u16> {
    let periods = timetable.period_labels.len();
    if periods > MAX_PERIODS_PER_DAY {
        return Err(Error::RenderError(format!(
            "{} periods per day do not fit in a worksheet (limit {})",
            periods, MAX_PERIODS_PER_DAY
        )));
    }
    u16::try_from(periods.max(1))
        .map_err(|_| Error::RenderError(format!("{} period columns overflow", periods)))
}

/// Column widths and the school banner.
fn setup_sheet(
    sheet: &mut Worksheet,
    timetable: &Timetable,
    last_col: u16,
    formats: &TimetableFormats,
    geometry: &SheetGeometry,
) -> std::result::Result<(), XlsxError> {
    sheet.set_column_width(0, geometry.label_width)?;
    for col in 1..=last_col {
        sheet.set_column_width(col, geometry.period_width)?;
    }

    sheet.merge_range(0, 0, 0, last_col, &timetable.school_name, &formats.banner)?;
    sheet.set_row_height(0, BANNER_HEIGHT)?;
    Ok(())
}

/// Write the period header row and one row per day. Returns the next free row.
fn write_grid(
    sheet: &mut Worksheet,
    mut row: u32,
    timetable: &Timetable,
    last_col: u16,
    grid: &ScheduleGrid,
    formats: &TimetableFormats,
) -> std::result::Result<u32, XlsxError> {
    sheet.write_string_with_format(row, 0, "Day/Period", &formats.corner)?;
    for (col, label) in (1..=last_col).zip(&timetable.period_labels) {
        sheet.write_string_with_format(row, col, label, &formats.period_header)?;
    }
    row += 1;

    for (day, cells) in timetable.days.iter().zip(grid.days()) {
        sheet.write_string_with_format(row, 0, day, &formats.day)?;
        for (col, value) in (1..=last_col).zip(cells) {
            if value.is_empty() {
                sheet.write_blank(row, col, &formats.data)?;
            } else {
                sheet.write_string_with_format(row, col, value, &formats.data)?;
            }
        }
        sheet.set_row_height(row, DAY_ROW_HEIGHT)?;
        row += 1;
    }

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::XlsxReader;
    use pretty_assertions::assert_eq;
    use timetable_core::{
        ClassCode, Extraction, RawCell, RawSheet, TeacherRecord, TimetableExtractor, ViewBuilder,
    };

    fn text(sheet: &RawSheet, row: usize, col: usize) -> Option<String> {
        sheet.cell(row, col).to_display()
    }

    fn sample_timetable() -> Timetable {
        let mut rao = vec![None; 48];
        rao[0] = ClassCode::parse("VIA");
        rao[9] = ClassCode::parse("VIB");
        let mut devi = vec![None; 48];
        devi[0] = ClassCode::parse("VIA");

        let extraction = Extraction {
            teachers: vec![
                TeacherRecord {
                    name: "Mr. Rao".to_string(),
                    designation: Some("TGT".to_string()),
                    subject: "Maths".to_string(),
                    periods: rao,
                },
                TeacherRecord {
                    name: "Ms. Devi".to_string(),
                    designation: None,
                    subject: "English".to_string(),
                    periods: devi,
                },
            ],
            classes: vec![
                ClassCode::parse("VIA").unwrap(),
                ClassCode::parse("VIB").unwrap(),
            ],
        };
        ViewBuilder::new().build("JNV Baksa", &extraction)
    }

    #[test]
    fn test_render_produces_xlsx() {
        let bytes = TimetableRenderer::new().render(&sample_timetable()).unwrap();
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[0..2], b"PK");

        let names = XlsxReader::new()
            .sheet_names(std::io::Cursor::new(bytes))
            .unwrap();
        assert_eq!(names, vec![TEACHER_SHEET_NAME, CLASS_SHEET_NAME, SUMMARY_SHEET_NAME]);
    }

    #[test]
    fn test_teacher_sheet_layout() {
        let bytes = TimetableRenderer::new().render(&sample_timetable()).unwrap();
        let sheet = XlsxReader::new()
            .read_sheet_from_bytes(&bytes, TEACHER_SHEET_NAME)
            .unwrap();

        assert_eq!(text(&sheet, 0, 0).as_deref(), Some("JNV Baksa"));
        assert_eq!(text(&sheet, 3, 0).as_deref(), Some("Mr. Rao\n(Maths)"));
        assert_eq!(text(&sheet, 5, 0).as_deref(), Some("Day/Period"));
        assert_eq!(text(&sheet, 5, 8).as_deref(), Some("P8"));
        assert_eq!(text(&sheet, 6, 0).as_deref(), Some("MON"));
        assert_eq!(text(&sheet, 6, 1).as_deref(), Some("VIA"));
        assert_eq!(text(&sheet, 7, 2).as_deref(), Some("VIB"));
        assert_eq!(text(&sheet, 11, 0).as_deref(), Some("SAT"));

        // Second block starts after six day rows and a two-row gap.
        assert_eq!(text(&sheet, 14, 0).as_deref(), Some("Ms. Devi\n(English)"));
    }

    #[test]
    fn test_class_sheet_shows_subject_abbreviations() {
        let bytes = TimetableRenderer::new().render(&sample_timetable()).unwrap();
        let sheet = XlsxReader::new()
            .read_sheet_from_bytes(&bytes, CLASS_SHEET_NAME)
            .unwrap();

        assert_eq!(text(&sheet, 3, 0).as_deref(), Some("Class VIA"));
        assert_eq!(text(&sheet, 6, 1).as_deref(), Some("Mat/Eng"));
        assert_eq!(sheet.cell(6, 2), &RawCell::Empty);
        assert_eq!(text(&sheet, 14, 0).as_deref(), Some("Class VIB"));
        assert_eq!(text(&sheet, 18, 2).as_deref(), Some("Mat"));
    }

    #[test]
    fn test_summary_sheet_counts() {
        let bytes = TimetableRenderer::new().render(&sample_timetable()).unwrap();
        let sheet = XlsxReader::new()
            .read_sheet_from_bytes(&bytes, SUMMARY_SHEET_NAME)
            .unwrap();

        assert_eq!(text(&sheet, 2, 0).as_deref(), Some("Teachers"));
        assert_eq!(sheet.cell(2, 1), &RawCell::Number(2.0));
        assert_eq!(sheet.cell(5, 1), &RawCell::Number(93.0));
        assert_eq!(text(&sheet, 8, 0).as_deref(), Some("Mr. Rao"));
        assert_eq!(sheet.cell(8, 3), &RawCell::Number(2.0));
        assert_eq!(text(&sheet, 9, 1), None);
    }

    #[test]
    fn test_too_many_periods_is_a_render_error() {
        for periods in [MAX_PERIODS_PER_DAY + 1, usize::from(u16::MAX) + 2] {
            let mut timetable = sample_timetable();
            timetable.period_labels = (1..=periods).map(|p| format!("P{}", p)).collect();

            let result = TimetableRenderer::new().render(&timetable);
            assert!(
                matches!(result, Err(Error::RenderError(_))),
                "{} periods were accepted",
                periods
            );
        }
    }

    #[test]
    fn test_empty_timetable_renders_banner_only() {
        let extraction = TimetableExtractor::new().extract(&RawSheet::new("SCHOOL TIMETABLE"));
        let timetable = ViewBuilder::new().build("JNV Baksa", &extraction);
        let bytes = TimetableRenderer::new()
            .without_summary()
            .render(&timetable)
            .unwrap();

        let reader = XlsxReader::new();
        let names = reader.sheet_names(std::io::Cursor::new(&bytes)).unwrap();
        assert_eq!(names, vec![TEACHER_SHEET_NAME, CLASS_SHEET_NAME]);

        for name in [TEACHER_SHEET_NAME, CLASS_SHEET_NAME] {
            let sheet = reader.read_sheet_from_bytes(&bytes, name).unwrap();
            assert_eq!(sheet.row_count(), 1);
            assert_eq!(text(&sheet, 0, 0).as_deref(), Some("JNV Baksa"));
        }
    }
}
