//! CSV schedule reader.

use csv::{ByteRecord, ReaderBuilder};
use std::io::Read;
use timetable_core::{Error, RawCell, RawSheet, Result};

/// UTF-8 byte order mark written by spreadsheet CSV exports.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Candidate field delimiters, in preference order.
const DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

/// Reader for CSV exports of the schedule sheet.
#[derive(Debug, Clone, Default)]
pub struct CsvReader {
    delimiter: Option<u8>,
}

impl CsvReader {
    /// Create a reader that detects the delimiter from the first line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed delimiter instead of detecting one.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Read a CSV stream into a sheet named `sheet_name`.
    pub fn read_sheet<R: Read>(&self, mut reader: R, sheet_name: &str) -> Result<RawSheet> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.read_sheet_from_bytes(&bytes, sheet_name)
    }

    /// Read an in-memory CSV upload.
    ///
    /// Rows may have different lengths. Numeric fields become numbers, blank
    /// fields become empty cells, invalid UTF-8 is replaced rather than rejected.
    pub fn read_sheet_from_bytes(&self, bytes: &[u8], sheet_name: &str) -> Result<RawSheet> {
        let data = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let delimiter = self.delimiter.unwrap_or_else(|| detect_delimiter(data));
        log::debug!(
            "Reading CSV '{}' with delimiter {:?}",
            sheet_name,
            delimiter as char
        );

        let mut csv_reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(data);

        let mut sheet = RawSheet::new(sheet_name);
        let mut record = ByteRecord::new();
        let mut row = 0usize;

        loop {
            let more = csv_reader.read_byte_record(&mut record).map_err(|e| {
                Error::CsvReadError(format!("Failed to read row {}: {}", row + 1, e))
            })?;
            if !more {
                break;
            }

            for (col, field) in record.iter().enumerate() {
                let cell = parse_field(&String::from_utf8_lossy(field));
                if cell != RawCell::Empty {
                    sheet.set(row, col, cell);
                }
            }
            row += 1;
        }

        log::debug!("CSV '{}' has {} rows", sheet_name, sheet.row_count());
        Ok(sheet)
    }
}

/// Pick the delimiter that occurs most often on the first line.
fn detect_delimiter(data: &[u8]) -> u8 {
    let first_line = data.split(|&b| b == b'\n').next().unwrap_or(data);
    DELIMITERS
        .iter()
        .copied()
        .max_by_key(|d| {
            let count = first_line.iter().filter(|b| *b == d).count();
            // Ties resolve to the earlier (preferred) delimiter.
            (count, std::cmp::Reverse(DELIMITERS.iter().position(|x| x == d)))
        })
        .unwrap_or(b',')
}

/// Convert a CSV field to a cell the way a spreadsheet would type it.
fn parse_field(field: &str) -> RawCell {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return RawCell::Empty;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => RawCell::Number(n),
        _ => RawCell::Text(field.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use timetable_core::{ClassCode, TimetableExtractor};

    #[test]
    fn test_parse_field() {
        assert_eq!(parse_field(""), RawCell::Empty);
        assert_eq!(parse_field("  "), RawCell::Empty);
        assert_eq!(parse_field("12"), RawCell::Number(12.0));
        assert_eq!(parse_field(" 3.5 "), RawCell::Number(3.5));
        assert_eq!(parse_field("VI A"), RawCell::Text("VI A".to_string()));
        // "inf" and "NaN" parse as f64 but are labels here
        assert_eq!(parse_field("NaN"), RawCell::Text("NaN".to_string()));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter(b"a,b,c\n1;2;3;4"), b',');
        assert_eq!(detect_delimiter(b"a;b;c\n"), b';');
        assert_eq!(detect_delimiter(b"a\tb\tc"), b'\t');
        assert_eq!(detect_delimiter(b"single"), b',');
    }

    #[test]
    fn test_reads_ragged_rows() {
        let data = b"S.NO,NAME OF TR,DESIG,SUBJECT,MON\n1,Mr. Rao,TGT,Maths,VI A,,VIB\n2,Ms. Devi\n";
        let sheet = CsvReader::new()
            .read_sheet_from_bytes(data, "SCHOOL TIMETABLE")
            .unwrap();

        assert_eq!(sheet.name, "SCHOOL TIMETABLE");
        assert_eq!(sheet.row_count(), 3);
        assert_eq!(sheet.cell(1, 0), &RawCell::Number(1.0));
        assert_eq!(sheet.cell(1, 1), &RawCell::Text("Mr. Rao".to_string()));
        assert_eq!(sheet.cell(1, 5), &RawCell::Empty);
        assert_eq!(sheet.cell(1, 6), &RawCell::Text("VIB".to_string()));
        assert_eq!(sheet.cell(2, 4), &RawCell::Empty);
    }

    #[test]
    fn test_strips_bom_and_uses_semicolons() {
        let mut data = UTF8_BOM.to_vec();
        data.extend_from_slice("1;Mr. Rao;TGT;Maths;\"VI A\"\n".as_bytes());

        let sheet = CsvReader::new()
            .read_sheet(data.as_slice(), "S")
            .unwrap();
        assert_eq!(sheet.cell(0, 0), &RawCell::Number(1.0));
        assert_eq!(sheet.cell(0, 4), &RawCell::Text("VI A".to_string()));
    }

    #[test]
    fn test_csv_feeds_extractor() {
        let data = b",Mr. Rao,Teacher,Maths,VI A,,VIB\n";
        let sheet = CsvReader::new()
            .with_delimiter(b',')
            .read_sheet_from_bytes(data, "S")
            .unwrap();
        let extraction = TimetableExtractor::new().extract(&sheet);

        assert_eq!(extraction.teachers.len(), 1);
        let rao = &extraction.teachers[0];
        assert_eq!(rao.name, "Mr. Rao");
        assert_eq!(rao.subject, "Maths");
        assert_eq!(rao.periods.len(), 48);
        assert_eq!(rao.periods[0], ClassCode::parse("VIA"));
        assert_eq!(rao.periods[1], None);
        assert_eq!(rao.periods[2], ClassCode::parse("VIB"));
    }
}
