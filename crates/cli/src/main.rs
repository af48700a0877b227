//! CLI tool for rendering timetables from a school schedule sheet.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use timetable_core::{
    AliasTable, ClassCode, ClassNormalizer, Extraction, ExtractionCache, Fingerprint, GridLayout,
    RawSheet, SourceFormat, TimetableExtractor, TimetableMetrics, ViewBuilder,
    DEFAULT_ABBREVIATION_LEN, DEFAULT_PERIODS_PER_DAY, DEFAULT_SHEET_NAME,
};
use timetable_xlsx::TimetableRenderer;

/// Render teacher-wise and class-wise timetables from a schedule sheet.
#[derive(Parser, Debug)]
#[command(name = "timetable-render")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input schedule file(s) (.xlsx or .csv)
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// School name shown in the banner and used in the output file name
    #[arg(short, long, default_value = "School")]
    school: String,

    /// Output directory (default: same as input file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Worksheet holding the teacher schedule
    #[arg(long, default_value = DEFAULT_SHEET_NAME)]
    sheet: String,

    /// Classes to include even if nobody teaches them (comma-separated)
    #[arg(short = 'c', long, value_delimiter = ',')]
    expected_classes: Vec<String>,

    /// JSON file mapping class label variants to canonical codes
    #[arg(short, long)]
    aliases: Option<PathBuf>,

    /// Day labels in sheet order (comma-separated, default MON..SAT)
    #[arg(long, value_delimiter = ',')]
    days: Vec<String>,

    /// Teaching periods per day
    #[arg(short, long, default_value_t = DEFAULT_PERIODS_PER_DAY)]
    periods_per_day: usize,

    /// Characters of the subject shown in class timetable cells
    #[arg(long, default_value_t = DEFAULT_ABBREVIATION_LEN)]
    abbrev_len: usize,

    /// Leave the Summary sheet out of the workbook
    #[arg(long)]
    no_summary: bool,

    /// Analyze only; do not write a workbook
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Print one JSON report per input instead of a text summary
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// What happened to one input file.
#[derive(Debug, Serialize)]
struct Report {
    input: PathBuf,
    output: Option<PathBuf>,
    metrics: TimetableMetrics,
    classes: Vec<ClassCode>,
}

/// Configured pipeline shared by every input of one run.
struct Pipeline {
    extractor: TimetableExtractor,
    views: ViewBuilder,
    renderer: TimetableRenderer,
    cache: ExtractionCache,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let mut pipeline = build_pipeline(&args)?;
    let mut failed = 0usize;

    for input_path in &args.input {
        if args.verbose {
            eprintln!("Processing: {}", input_path.display());
        }

        match process_file(input_path, &args, &mut pipeline) {
            Ok(report) => print_report(&report, args.json)?,
            Err(e) => {
                eprintln!("Error processing {}: {:#}", input_path.display(), e);
                failed += 1;
            }
        }
    }

    if args.verbose {
        let (hits, misses) = pipeline.cache.stats();
        eprintln!("Extraction cache: {} hits, {} misses", hits, misses);
    }

    if failed > 0 {
        anyhow::bail!("{} of {} input(s) failed", failed, args.input.len());
    }

    Ok(())
}

/// Build the extractor, view builder and renderer from the command line.
fn build_pipeline(args: &Args) -> Result<Pipeline> {
    let grid = if args.days.is_empty() {
        GridLayout::try_new(
            timetable_core::DEFAULT_DAYS.iter().copied(),
            args.periods_per_day,
        )
    } else {
        GridLayout::try_new(args.days.iter().map(|d| d.trim().to_uppercase()), args.periods_per_day)
    }
    .context("Invalid timetable grid")?;

    let mut normalizer = ClassNormalizer::new();
    if let Some(path) = &args.aliases {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read alias table {}", path.display()))?;
        let aliases = AliasTable::from_json(&json)
            .with_context(|| format!("Invalid alias table {}", path.display()))?;
        log::info!("Loaded {} class aliases from {}", aliases.len(), path.display());
        normalizer = normalizer.with_aliases(aliases);
    }

    let extractor = TimetableExtractor::new()
        .with_grid(grid.clone())
        .with_normalizer(normalizer.clone());

    let views = ViewBuilder::new()
        .with_grid(grid)
        .with_normalizer(normalizer)
        .with_expected_classes(args.expected_classes.iter().cloned())
        .with_abbreviation_len(args.abbrev_len);

    let renderer = if args.no_summary {
        TimetableRenderer::new().without_summary()
    } else {
        TimetableRenderer::new()
    };

    Ok(Pipeline {
        extractor,
        views,
        renderer,
        cache: ExtractionCache::new(),
    })
}

/// Extract, aggregate and (unless dry-run) render a single schedule file.
fn process_file(input_path: &Path, args: &Args, pipeline: &mut Pipeline) -> Result<Report> {
    let bytes = std::fs::read(input_path)
        .with_context(|| format!("Failed to open {}", input_path.display()))?;

    let filename = input_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");

    let format = SourceFormat::detect(&bytes, filename)
        .ok_or_else(|| anyhow::anyhow!("Could not detect file format"))?;

    let fingerprint = Fingerprint::of(&bytes, &args.sheet);
    let extractor = &pipeline.extractor;
    let extraction: &Extraction = pipeline.cache.get_or_try_insert_with(fingerprint, || {
        let sheet = read_sheet(&bytes, format, &args.sheet)?;
        Ok(extractor.extract(&sheet))
    })?;

    if extraction.is_empty() {
        log::warn!("No teacher rows found in {}", input_path.display());
    }

    let timetable = pipeline.views.build(&args.school, extraction);

    if args.verbose {
        eprintln!(
            "  Found {} teachers, {} classes",
            timetable.metrics.teachers, timetable.metrics.classes
        );
    }

    let output = if args.dry_run {
        None
    } else {
        let bytes = pipeline.renderer.render(&timetable)?;
        let file_name = timetable.file_name(chrono::Local::now().naive_local());
        let output_path = get_output_path(input_path, args.output.as_ref(), &file_name)?;
        std::fs::write(&output_path, bytes)
            .with_context(|| format!("Failed to write to {}", output_path.display()))?;
        if args.verbose {
            eprintln!("Written to: {}", output_path.display());
        }
        Some(output_path)
    };

    Ok(Report {
        input: input_path.to_path_buf(),
        output,
        metrics: timetable.metrics,
        classes: timetable.classes.iter().map(|c| c.class.clone()).collect(),
    })
}

/// Read the schedule sheet with the backend for `format`.
fn read_sheet(bytes: &[u8], format: SourceFormat, sheet: &str) -> timetable_core::Result<RawSheet> {
    match format {
        SourceFormat::Xlsx => {
            log::debug!("Reading as XLSX");
            timetable_xlsx::XlsxReader::new().read_sheet_from_bytes(bytes, sheet)
        }
        SourceFormat::Csv => {
            log::debug!("Reading as CSV");
            timetable_csv::CsvReader::new().read_sheet_from_bytes(bytes, sheet)
        }
    }
}

/// Determine the output path for a rendered workbook.
///
/// Never overwrites: a numeric suffix is added if the name is taken.
fn get_output_path(input_path: &Path, output_dir: Option<&PathBuf>, file_name: &str) -> Result<PathBuf> {
    let dir = match output_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
            dir.clone()
        }
        None => input_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };

    let mut candidate = dir.join(file_name);
    let stem = file_name.trim_end_matches(".xlsx");
    let mut n = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{}_{}.xlsx", stem, n));
        n += 1;
    }

    Ok(candidate)
}

fn print_report(report: &Report, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }

    let m = &report.metrics;
    println!(
        "{}: {} teachers, {} classes, {} assigned / {} free periods",
        report.input.display(),
        m.teachers,
        m.classes,
        m.assigned_slots,
        m.free_slots
    );
    if !report.classes.is_empty() {
        let shown: Vec<&str> = report.classes.iter().take(6).map(ClassCode::as_str).collect();
        let more = if report.classes.len() > 6 { ", ..." } else { "" };
        println!("  Classes: {}{}", shown.join(", "), more);
    }
    if let Some(output) = &report.output {
        println!("  Saved: {}", output.display());
    }

    Ok(())
}
