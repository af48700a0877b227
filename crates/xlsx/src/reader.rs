//! XLSX schedule sheet reader.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use timetable_core::{Error, RawCell, RawSheet, Result};
use zip::ZipArchive;

/// Largest row count of an XLSX worksheet.
const MAX_ROWS: usize = 1_048_576;

/// Largest column count of an XLSX worksheet (column XFD).
const MAX_COLUMNS: usize = 16_384;

/// Reader for one worksheet of an XLSX (Office Open XML) workbook.
pub struct XlsxReader;

impl XlsxReader {
    /// Create a new XLSX reader.
    pub fn new() -> Self {
        Self
    }

    /// Read the named worksheet from an in-memory upload.
    pub fn read_sheet_from_bytes(&self, bytes: &[u8], sheet_name: &str) -> Result<RawSheet> {
        self.read_sheet(Cursor::new(bytes), sheet_name)
    }

    /// Read the named worksheet into a grid of raw cells.
    ///
    /// The name is matched exactly first, then ignoring case and surrounding
    /// whitespace.
    pub fn read_sheet<R: Read + Seek>(&self, reader: R, sheet_name: &str) -> Result<RawSheet> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let sheets = self.get_sheet_list(&mut archive)?;
        let rels = self.get_sheet_paths(&mut archive)?;

        let (name, rel_id) = sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .or_else(|| {
                sheets
                    .iter()
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case(sheet_name.trim()))
            })
            .ok_or_else(|| Error::SheetNotFound {
                name: sheet_name.to_string(),
                available: sheets
                    .iter()
                    .map(|(n, _)| n.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;

        if name != sheet_name {
            log::warn!("Using worksheet '{}' for requested '{}'", name, sheet_name);
        }

        let path = rels.get(rel_id).ok_or_else(|| {
            Error::XlsxReadError(format!("No worksheet part for '{}' ({})", name, rel_id))
        })?;

        let shared_strings = self.get_shared_strings(&mut archive)?;
        log::debug!(
            "Reading worksheet '{}' from {} ({} shared strings)",
            name,
            path,
            shared_strings.len()
        );

        let content = self.read_file_from_archive(&mut archive, path)?;
        let mut sheet = RawSheet::new(name.clone());
        self.parse_sheet_data(&content, &shared_strings, &mut sheet)?;

        Ok(sheet)
    }

    /// List worksheet names in workbook order.
    pub fn sheet_names<R: Read + Seek>(&self, reader: R) -> Result<Vec<String>> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;
        Ok(self
            .get_sheet_list(&mut archive)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    /// Get (sheet name, relationship id) pairs from xl/workbook.xml.
    fn get_sheet_list<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
    ) -> Result<Vec<(String, String)>> {
        let content = self.read_file_from_archive(archive, "xl/workbook.xml")?;
        let mut reader = Reader::from_str(&content);
        reader.trim_text(true);

        let mut sheets = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if local_name(e.name().as_ref()) == b"sheet" =>
                {
                    let mut name = None;
                    let mut rel_id = None;

                    for attr in e.attributes().flatten() {
                        match local_name(attr.key.as_ref()) {
                            b"name" => {
                                name = attr.unescape_value().ok().map(|v| v.to_string());
                            }
                            b"id" => {
                                rel_id = attr.unescape_value().ok().map(|v| v.to_string());
                            }
                            _ => {}
                        }
                    }

                    if let (Some(name), Some(rel_id)) = (name, rel_id) {
                        sheets.push((name, rel_id));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!("Error parsing workbook: {}", e)));
                }
                _ => {}
            }
        }

        Ok(sheets)
    }

    /// Map relationship ids to worksheet part paths from xl/_rels/workbook.xml.rels.
    fn get_sheet_paths<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
    ) -> Result<HashMap<String, String>> {
        let content = self.read_file_from_archive(archive, "xl/_rels/workbook.xml.rels")?;
        let mut reader = Reader::from_str(&content);
        reader.trim_text(true);

        let mut paths = HashMap::new();

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if e.name().as_ref() == b"Relationship" =>
                {
                    let mut rel_type = String::new();
                    let mut target = String::new();
                    let mut id = String::new();

                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"Type" => {
                                rel_type = String::from_utf8_lossy(&attr.value).to_string();
                            }
                            b"Target" => {
                                target = String::from_utf8_lossy(&attr.value).to_string();
                            }
                            b"Id" => {
                                id = String::from_utf8_lossy(&attr.value).to_string();
                            }
                            _ => {}
                        }
                    }

                    if rel_type.ends_with("/worksheet") {
                        let full_path = match target.strip_prefix('/') {
                            Some(absolute) => absolute.to_string(),
                            None => format!("xl/{}", target),
                        };
                        paths.insert(id, full_path);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!(
                        "Error parsing relationships: {}",
                        e
                    )));
                }
                _ => {}
            }
        }

        Ok(paths)
    }

    /// Read the shared string table. A workbook without one is valid.
    fn get_shared_strings<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
        if archive.by_name("xl/sharedStrings.xml").is_err() {
            return Ok(Vec::new());
        }
        let content = self.read_file_from_archive(archive, "xl/sharedStrings.xml")?;

        let mut reader = Reader::from_str(&content);
        reader.trim_text(false);

        let mut strings = Vec::new();
        let mut current = String::new();
        let mut in_text = false;
        // Phonetic runs (<rPh>) repeat the reading, not the value.
        let mut in_phonetic = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                    b"si" => current.clear(),
                    b"t" if !in_phonetic => in_text = true,
                    b"rPh" => in_phonetic = true,
                    _ => {}
                },
                Ok(Event::Empty(ref e)) if local_name(e.name().as_ref()) == b"si" => {
                    strings.push(String::new());
                }
                Ok(Event::Text(ref e)) if in_text => {
                    let text = e
                        .unescape()
                        .map_err(|e| Error::XmlError(format!("Bad shared string: {}", e)))?;
                    current.push_str(&text);
                }
                Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                    b"si" => strings.push(std::mem::take(&mut current)),
                    b"t" => in_text = false,
                    b"rPh" => in_phonetic = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!(
                        "Error parsing shared strings: {}",
                        e
                    )));
                }
                _ => {}
            }
        }

        Ok(strings)
    }

    /// Fill `sheet` from the <sheetData> of a worksheet part.
    fn parse_sheet_data(
        &self,
        xml_content: &str,
        shared_strings: &[String],
        sheet: &mut RawSheet,
    ) -> Result<()> {
        let mut reader = Reader::from_str(xml_content);
        reader.trim_text(false);

        let mut row_index = 0usize;
        let mut next_row = 0usize;
        let mut next_col = 0usize;
        let mut current: Option<CellInfo> = None;
        let mut in_value = false;
        let mut in_inline_text = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                    b"row" => {
                        row_index = row_number(e)?.map(|r| r - 1).unwrap_or(next_row);
                        next_row = row_index + 1;
                        next_col = 0;
                    }
                    b"c" => {
                        let cell = CellInfo::from_start(e, row_index, next_col)?;
                        next_col = cell.col + 1;
                        current = Some(cell);
                    }
                    b"v" => in_value = true,
                    b"t" if current.is_some() => in_inline_text = true,
                    _ => {}
                },
                Ok(Event::Empty(ref e)) => match local_name(e.name().as_ref()) {
                    b"row" => {
                        next_row = row_number(e)?.unwrap_or(next_row + 1);
                    }
                    b"c" => {
                        // Styled but empty cell
                        next_col = CellInfo::from_start(e, row_index, next_col)?.col + 1;
                    }
                    _ => {}
                },
                Ok(Event::Text(ref e)) if in_value || in_inline_text => {
                    if let Some(ref mut cell) = current {
                        let text = e
                            .unescape()
                            .map_err(|e| Error::XmlError(format!("Bad cell text: {}", e)))?;
                        cell.text.push_str(&text);
                    }
                }
                Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                    b"c" => {
                        if let Some(cell) = current.take() {
                            let (row, col) = (cell.row, cell.col);
                            check_position(row, col)?;
                            let value = cell.into_raw(shared_strings);
                            if value != RawCell::Empty {
                                sheet.set(row, col, value);
                            }
                        }
                    }
                    b"v" => in_value = false,
                    b"t" => in_inline_text = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!(
                        "Error parsing worksheet at byte {}: {}",
                        reader.buffer_position(),
                        e
                    )));
                }
                _ => {}
            }
        }

        log::debug!("Worksheet '{}' has {} rows", sheet.name, sheet.row_count());
        Ok(())
    }

    /// Read a file from the ZIP archive.
    fn read_file_from_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Result<String> {
        let mut file = archive
            .by_name(path)
            .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

        Ok(content)
    }
}

impl Default for XlsxReader {
    fn default() -> Self {
        Self::new()
    }
}

/// A <c> element being collected.
#[derive(Debug)]
struct CellInfo {
    row: usize,
    col: usize,
    cell_type: Option<String>,
    text: String,
}

impl CellInfo {
    /// Position comes from the `r` attribute, or follows the previous cell.
    fn from_start(e: &BytesStart, row: usize, next_col: usize) -> Result<Self> {
        let mut cell = Self {
            row,
            col: next_col,
            cell_type: None,
            text: String::new(),
        };

        for attr in e.attributes().flatten() {
            match attr.key.as_ref() {
                b"r" => {
                    if let Some((r, c)) = parse_cell_ref(&String::from_utf8_lossy(&attr.value))? {
                        cell.row = r;
                        cell.col = c;
                    }
                }
                b"t" => {
                    cell.cell_type = Some(String::from_utf8_lossy(&attr.value).to_string());
                }
                _ => {}
            }
        }

        Ok(cell)
    }

    fn into_raw(self, shared_strings: &[String]) -> RawCell {
        match self.cell_type.as_deref() {
            Some("s") => {
                let index = self.text.trim().parse::<usize>().ok();
                match index.and_then(|i| shared_strings.get(i)) {
                    Some(s) => RawCell::from_text(s.as_str()),
                    None => {
                        log::warn!(
                            "Shared string index '{}' out of range at row {}, col {}",
                            self.text,
                            self.row + 1,
                            self.col + 1
                        );
                        RawCell::Empty
                    }
                }
            }
            Some("inlineStr") | Some("str") => RawCell::from_text(self.text),
            Some("b") => RawCell::Bool(self.text.trim() == "1"),
            Some("e") => RawCell::Empty,
            _ => match self.text.trim() {
                "" => RawCell::Empty,
                t => t
                    .parse::<f64>()
                    .map(RawCell::Number)
                    .unwrap_or_else(|_| RawCell::from_text(t)),
            },
        }
    }
}

/// 1-based row number from a <row r="..."> element.
///
/// A missing or non-numeric `r` yields `None`; a row past the worksheet
/// limit is an error.
fn row_number(e: &BytesStart) -> Result<Option<usize>> {
    let Some(attr) = e.attributes().flatten().find(|a| a.key.as_ref() == b"r") else {
        return Ok(None);
    };
    let value = String::from_utf8_lossy(&attr.value);
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }

    match value.parse::<usize>() {
        Ok(0) => Ok(None),
        Ok(row) if row <= MAX_ROWS => Ok(Some(row)),
        _ => Err(Error::XlsxReadError(format!(
            "Row number {} is beyond the worksheet limit of {} rows",
            value, MAX_ROWS
        ))),
    }
}

/// Reject a 0-based position outside the worksheet grid.
fn check_position(row: usize, col: usize) -> Result<()> {
    if row >= MAX_ROWS || col >= MAX_COLUMNS {
        return Err(Error::XlsxReadError(format!(
            "Cell at row {}, column {} is outside the worksheet",
            row.saturating_add(1),
            col.saturating_add(1)
        )));
    }
    Ok(())
}

/// Extract the local name from a potentially namespaced XML element name.
fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Parse an A1-style reference into 0-based (row, col).
///
/// Text that is not an A1 reference yields `None`. A reference past column
/// XFD or row 1048576 is an error.
fn parse_cell_ref(reference: &str) -> Result<Option<(usize, usize)>> {
    let split = reference
        .bytes()
        .take_while(u8::is_ascii_alphabetic)
        .count();
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }

    let out_of_range = || {
        Error::XlsxReadError(format!(
            "Cell reference {} is outside the worksheet",
            reference
        ))
    };

    let col = letters.bytes().try_fold(0usize, |acc, b| {
        let col = acc * 26 + usize::from(b.to_ascii_uppercase() - b'A' + 1);
        (col <= MAX_COLUMNS).then_some(col)
    });
    let row = match digits.parse::<usize>() {
        Ok(0) => return Ok(None),
        Ok(row) if row <= MAX_ROWS => row,
        _ => return Err(out_of_range()),
    };
    let col = col.ok_or_else(out_of_range)?;

    Ok(Some((row - 1, col - 1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_xlsxwriter::Workbook;

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("A1").unwrap(), Some((0, 0)));
        assert_eq!(parse_cell_ref("B3").unwrap(), Some((2, 1)));
        assert_eq!(parse_cell_ref("Z10").unwrap(), Some((9, 25)));
        assert_eq!(parse_cell_ref("AA1").unwrap(), Some((0, 26)));
        assert_eq!(parse_cell_ref("AZ2").unwrap(), Some((1, 51)));
        assert_eq!(parse_cell_ref("XFD1048576").unwrap(), Some((1_048_575, 16_383)));
        assert_eq!(parse_cell_ref("A0").unwrap(), None);
        assert_eq!(parse_cell_ref("12").unwrap(), None);
        assert_eq!(parse_cell_ref("B").unwrap(), None);
        assert_eq!(parse_cell_ref("B2x").unwrap(), None);
    }

    #[test]
    fn test_parse_cell_ref_beyond_limits() {
        assert!(matches!(parse_cell_ref("XFE1"), Err(Error::XlsxReadError(_))));
        assert!(matches!(parse_cell_ref("A1048577"), Err(Error::XlsxReadError(_))));
        assert!(matches!(
            parse_cell_ref("ZZZZZZZZZZZZZZZ1"),
            Err(Error::XlsxReadError(_))
        ));
        assert!(matches!(
            parse_cell_ref("A99999999999999999999999"),
            Err(Error::XlsxReadError(_))
        ));
    }

    #[test]
    fn test_huge_column_reference_is_an_error() {
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="ZZZZZZZZZZZZZZZ1" t="inlineStr"><is><t>VI A</t></is></c></row>
        </sheetData></worksheet>"#;
        let mut sheet = RawSheet::new("S");

        let result = XlsxReader::new().parse_sheet_data(xml, &[], &mut sheet);
        assert!(matches!(result, Err(Error::XlsxReadError(_))));
        assert_eq!(sheet.row_count(), 0);
    }

    #[test]
    fn test_huge_row_number_is_an_error() {
        let xml = r#"<worksheet><sheetData>
            <row r="99999999999"><c><v>1</v></c></row>
        </sheetData></worksheet>"#;
        let mut sheet = RawSheet::new("S");

        let result = XlsxReader::new().parse_sheet_data(xml, &[], &mut sheet);
        assert!(matches!(result, Err(Error::XlsxReadError(_))));

        let empty_row = r#"<worksheet><sheetData><row r="2000000"/></sheetData></worksheet>"#;
        let result = XlsxReader::new().parse_sheet_data(empty_row, &[], &mut sheet);
        assert!(matches!(result, Err(Error::XlsxReadError(_))));
    }

    #[test]
    fn test_cells_running_past_last_column_are_an_error() {
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="XFD1"><v>1</v></c><c><v>2</v></c></row>
        </sheetData></worksheet>"#;
        let mut sheet = RawSheet::new("S");

        let result = XlsxReader::new().parse_sheet_data(xml, &[], &mut sheet);
        assert!(matches!(result, Err(Error::XlsxReadError(_))));
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"x:c"), b"c");
        assert_eq!(local_name(b"r:id"), b"id");
        assert_eq!(local_name(b"sheet"), b"sheet");
    }

    #[test]
    fn test_parse_sheet_data_cell_types() {
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>1</v></c><c r="C1"><v>42</v></c></row>
            <row r="3"><c r="B3" t="inlineStr"><is><t>VI A</t></is></c><c t="b"><v>1</v></c>
                <c r="E3" t="e"><v>#N/A</v></c><c r="F3" s="2"/></row>
            <row><c t="str"><f>A1</f><v>Maths</v></c></row>
        </sheetData></worksheet>"#;
        let shared = vec!["Mr. Rao".to_string(), "Maths".to_string()];
        let mut sheet = RawSheet::new("S");

        XlsxReader::new()
            .parse_sheet_data(xml, &shared, &mut sheet)
            .unwrap();

        assert_eq!(sheet.cell(0, 0), &RawCell::Text("Maths".to_string()));
        assert_eq!(sheet.cell(0, 2), &RawCell::Number(42.0));
        assert_eq!(sheet.cell(2, 1), &RawCell::Text("VI A".to_string()));
        assert_eq!(sheet.cell(2, 2), &RawCell::Bool(true));
        assert_eq!(sheet.cell(2, 4), &RawCell::Empty);
        // Row without r attribute follows row 3; formula text is not the value.
        assert_eq!(sheet.cell(3, 0), &RawCell::Text("Maths".to_string()));
    }

    fn source_workbook() -> Vec<u8> {
        let mut workbook = Workbook::new();
        let notes = workbook.add_worksheet();
        notes.set_name("Notes").unwrap();
        notes.write_string(0, 0, "ignore me").unwrap();

        let sheet = workbook.add_worksheet();
        sheet.set_name("SCHOOL TIMETABLE").unwrap();
        sheet.write_string(0, 1, "NAME OF TR").unwrap();
        sheet.write_number(1, 0, 1).unwrap();
        sheet.write_string(1, 1, "Mr. Rao").unwrap();
        sheet.write_string(1, 2, "TGT").unwrap();
        sheet.write_string(1, 3, "Maths").unwrap();
        sheet.write_string(1, 4, "VI A").unwrap();
        sheet.write_string(1, 6, "vi b").unwrap();
        sheet.write_number(1, 7, 7).unwrap();

        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_read_named_sheet() {
        let bytes = source_workbook();
        let sheet = XlsxReader::new()
            .read_sheet_from_bytes(&bytes, "SCHOOL TIMETABLE")
            .unwrap();

        assert_eq!(sheet.name, "SCHOOL TIMETABLE");
        assert_eq!(sheet.cell(0, 1), &RawCell::Text("NAME OF TR".to_string()));
        assert_eq!(sheet.cell(1, 0), &RawCell::Number(1.0));
        assert_eq!(sheet.cell(1, 1), &RawCell::Text("Mr. Rao".to_string()));
        assert_eq!(sheet.cell(1, 4), &RawCell::Text("VI A".to_string()));
        assert_eq!(sheet.cell(1, 5), &RawCell::Empty);
        assert_eq!(sheet.cell(1, 7), &RawCell::Number(7.0));
    }

    #[test]
    fn test_sheet_name_match_ignores_case() {
        let bytes = source_workbook();
        let sheet = XlsxReader::new()
            .read_sheet_from_bytes(&bytes, "school timetable")
            .unwrap();
        assert_eq!(sheet.name, "SCHOOL TIMETABLE");
    }

    #[test]
    fn test_missing_sheet_lists_available() {
        let bytes = source_workbook();
        let err = XlsxReader::new()
            .read_sheet_from_bytes(&bytes, "TIMETABLE 2025")
            .unwrap_err();
        match err {
            Error::SheetNotFound { name, available } => {
                assert_eq!(name, "TIMETABLE 2025");
                assert_eq!(available, "Notes, SCHOOL TIMETABLE");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_sheet_names() {
        let bytes = source_workbook();
        let names = XlsxReader::new().sheet_names(Cursor::new(bytes)).unwrap();
        assert_eq!(names, vec!["Notes", "SCHOOL TIMETABLE"]);
    }

    #[test]
    fn test_not_a_zip_is_an_error() {
        let err = XlsxReader::new()
            .read_sheet_from_bytes(b"NAME,SUBJECT\n", "SCHOOL TIMETABLE")
            .unwrap_err();
        assert!(matches!(err, Error::ZipError(_)));
    }
}
