//! WASM-compatible wrapper for timetable rendering.
//!
//! This crate exposes upload analysis and workbook generation to JavaScript
//! for use in Cloudflare Workers. A [`TimetableSession`] keeps parsed uploads
//! so that analyzing and then generating the same file parses it once.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use timetable_core::{
    ClassNormalizer, ExtractionCache, Fingerprint, RawSheet, SourceFormat, TimetableExtractor,
    TimetableMetrics, ViewBuilder, DEFAULT_SHEET_NAME,
};
use timetable_xlsx::TimetableRenderer;
use wasm_bindgen::prelude::*;

#[wasm_bindgen(start)]
pub fn init() {
    // Set up better panic messages in the console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Result of analyzing an upload.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Detected format of the source file.
    pub format: String,
    /// Teacher, class and slot counts.
    pub metrics: TimetableMetrics,
    /// Class codes in display order.
    pub classes: Vec<String>,
    /// Warning message if the sheet had no teacher rows.
    pub warning: Option<String>,
}

/// A rendered workbook ready for download.
#[wasm_bindgen]
pub struct GeneratedWorkbook {
    file_name: String,
    bytes: Vec<u8>,
}

#[wasm_bindgen]
impl GeneratedWorkbook {
    /// Suggested download file name.
    #[wasm_bindgen(getter, js_name = fileName)]
    pub fn file_name(&self) -> String {
        self.file_name.clone()
    }

    /// Workbook bytes (a `Uint8Array` in JavaScript).
    #[wasm_bindgen(getter)]
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

/// Per-visitor state: configuration plus the extraction cache.
///
/// The cache holds the latest upload only, so analyzing and then generating
/// one file parses it once and a new file replaces it.
#[wasm_bindgen]
pub struct TimetableSession {
    sheet_name: String,
    expected_classes: Vec<String>,
    extractor: TimetableExtractor,
    cache: ExtractionCache,
}

impl Default for TimetableSession {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl TimetableSession {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            expected_classes: Vec::new(),
            extractor: TimetableExtractor::new(),
            cache: ExtractionCache::new(),
        }
    }

    /// Read schedules from a different worksheet.
    #[wasm_bindgen(js_name = setSheetName)]
    pub fn set_sheet_name(&mut self, name: &str) {
        self.sheet_name = name.to_string();
    }

    /// Classes to list even when nobody teaches them (an array of strings).
    #[wasm_bindgen(js_name = setExpectedClasses)]
    pub fn set_expected_classes(&mut self, classes: JsValue) -> Result<(), JsValue> {
        self.expected_classes = serde_wasm_bindgen::from_value(classes)
            .map_err(|e| JsValue::from_str(&format!("Invalid class list: {}", e)))?;
        Ok(())
    }

    /// Parse an upload and report what was found.
    ///
    /// # Arguments
    /// * `data` - The raw bytes of the XLSX or CSV file
    /// * `filename` - The original filename (used for format detection)
    pub fn analyze(&mut self, data: &[u8], filename: &str) -> Result<JsValue, JsValue> {
        let result = self
            .analyze_impl(data, filename)
            .map_err(|e| JsValue::from_str(&e))?;

        serde_wasm_bindgen::to_value(&result)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Render the timetable workbook for an upload.
    pub fn generate(
        &mut self,
        data: &[u8],
        filename: &str,
        school_name: &str,
    ) -> Result<GeneratedWorkbook, JsValue> {
        let now = chrono::Local::now().naive_local();
        self.generate_impl(data, filename, school_name, now)
            .map_err(|e| JsValue::from_str(&e))
    }

    /// Forget all parsed uploads.
    #[wasm_bindgen(js_name = clearCache)]
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

impl TimetableSession {
    fn view_builder(&self) -> ViewBuilder {
        ViewBuilder::new()
            .with_grid(self.extractor.grid().clone())
            .with_normalizer(self.extractor.normalizer().clone())
            .with_expected_classes(self.expected_classes.iter().cloned())
    }

    fn analyze_impl(&mut self, data: &[u8], filename: &str) -> Result<AnalysisResult, String> {
        let format = detect_format(data, filename)?;
        let views = self.view_builder();
        let extraction = self.extract(data, format)?;
        let timetable = views.build("", extraction);

        let warning = extraction
            .is_empty()
            .then(|| "No teacher rows found".to_string());

        Ok(AnalysisResult {
            format: match format {
                SourceFormat::Xlsx => "xlsx".to_string(),
                SourceFormat::Csv => "csv".to_string(),
            },
            metrics: timetable.metrics,
            classes: timetable.classes.iter().map(|c| c.class.to_string()).collect(),
            warning,
        })
    }

    fn generate_impl(
        &mut self,
        data: &[u8],
        filename: &str,
        school_name: &str,
        at: NaiveDateTime,
    ) -> Result<GeneratedWorkbook, String> {
        let format = detect_format(data, filename)?;
        let views = self.view_builder();
        let extraction = self.extract(data, format)?;
        let timetable = views.build(school_name, extraction);

        let bytes = TimetableRenderer::new()
            .render(&timetable)
            .map_err(|e| e.to_string())?;

        Ok(GeneratedWorkbook {
            file_name: timetable.file_name(at),
            bytes,
        })
    }

    fn extract(
        &mut self,
        data: &[u8],
        format: SourceFormat,
    ) -> Result<&timetable_core::Extraction, String> {
        let key = Fingerprint::of(data, &self.sheet_name);
        let sheet_name = &self.sheet_name;
        let extractor = &self.extractor;
        self.cache
            .get_or_try_insert_with(key, || {
                let sheet = read_sheet(data, format, sheet_name)?;
                Ok(extractor.extract(&sheet))
            })
            .map_err(|e| e.to_string())
    }
}

fn detect_format(data: &[u8], filename: &str) -> Result<SourceFormat, String> {
    // Need at least 4 bytes for magic detection
    if data.len() < 4 {
        return Err("File too small to be a valid schedule".to_string());
    }

    SourceFormat::detect(data, filename).ok_or_else(|| "Could not detect file format".to_string())
}

fn read_sheet(data: &[u8], format: SourceFormat, sheet: &str) -> timetable_core::Result<RawSheet> {
    match format {
        SourceFormat::Xlsx => timetable_xlsx::XlsxReader::new().read_sheet_from_bytes(data, sheet),
        SourceFormat::Csv => timetable_csv::CsvReader::new().read_sheet_from_bytes(data, sheet),
    }
}

/// Normalize one class label the way the extractor does.
///
/// Lets the upload form preview what a typed class name will become.
/// Returns `undefined` for labels that are not class codes.
#[wasm_bindgen(js_name = normalizeClassLabel)]
pub fn normalize_class_label(label: &str) -> Option<String> {
    ClassNormalizer::new()
        .normalize_label(label)
        .map(|c| c.to_string())
}
