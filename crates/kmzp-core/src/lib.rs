pub mod archive;
pub mod error;
pub mod file_name;
pub mod image;
pub mod path_norm;
pub mod placemark;
pub mod references;
pub mod report;
pub mod resolve;
pub mod run_log;
pub mod writer;

use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub use error::{ExtractError, Result};
pub use image::{ExtractedImage, ImageData};
pub use run_log::{LogEntry, LogStatus};

use archive::KmzArchive;
use resolve::ImageResolver;
use run_log::RunLog;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractOptions {
    /// Keep the `?-` marker prefix in generated file names
    #[serde(default)]
    pub keep_structure: bool,
    /// Process every named placemark, not only `?-` marked ones
    #[serde(default)]
    pub extract_all_images: bool,
}

/// Outcome of one successful run.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// Placemarks that passed the name filter, with or without images
    pub total_placemarks: usize,
    pub total_photos: usize,
    /// Images in the output archive, in extraction order
    pub images: Vec<ExtractedImage>,
    pub logs: Vec<LogEntry>,
    /// Zip container holding one entry per image
    pub output_archive: Vec<u8>,
}

impl ExtractionResult {
    /// Warning and error entries only.
    pub fn warnings(&self) -> impl Iterator<Item = &LogEntry> {
        self.logs
            .iter()
            .filter(|e| matches!(e.status, LogStatus::Warning | LogStatus::Error))
    }

    /// Whether the run succeeded with warnings or per-image errors.
    pub fn has_problems(&self) -> bool {
        self.warnings().next().is_some()
    }
}

/// Pipeline stages, in order, as reported to the progress callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Scan,
    Resolve,
    Assemble,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Scan => "scan",
            Stage::Resolve => "resolve",
            Stage::Assemble => "assemble",
        }
    }
}

/// Type alias for progress callback: (stage, current, total, message)
pub type ProgressCallback<'a> = dyn Fn(&str, u64, u64, &str) + Send + Sync + 'a;

/// Throttled progress reporter, emits at most every 200ms or on completion.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback<'a>,
    last_emit: Mutex<Option<Instant>>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback<'a>) -> Self {
        Self {
            inner,
            last_emit: Mutex::new(None),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = current + 1 >= total;
        if !is_done {
            let mut last = self.last_emit.lock().unwrap_or_else(|e| e.into_inner());
            if (*last).is_some_and(|t| t.elapsed() < Duration::from_millis(200)) {
                return;
            }
            *last = Some(Instant::now());
        }
        (self.inner)(stage, current, total, message);
    }
}

/// Name offered for the output archive: `<base>_extracted_photos.zip`,
/// where `<base>` is the input file name without its last extension.
pub fn output_file_name(input: &Path) -> String {
    let base = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("kmz");
    format!("{}_extracted_photos.zip", base)
}

/// Read a KMZ file from disk and run [`extract`] on it.
pub fn extract_file(
    path: &Path,
    options: &ExtractOptions,
    progress_callback: &ProgressCallback<'_>,
) -> Result<ExtractionResult> {
    let bytes = std::fs::read(path)?;
    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("input.kmz");
    extract(source, bytes, options, progress_callback)
}

/// Run the full extraction pipeline over one KMZ container.
///
/// Every call owns its own placemark, image and log state, so runs never
/// share anything. Opening the archive, locating and parsing the KML are
/// fatal on failure; problems with individual references are logged and
/// the run continues.
pub fn extract(
    source: &str,
    bytes: Vec<u8>,
    options: &ExtractOptions,
    progress_callback: &ProgressCallback<'_>,
) -> Result<ExtractionResult> {
    let tp = ThrottledProgress::new(progress_callback);
    let mut log = RunLog::new();

    // Stage 1: Load
    tp.report(Stage::Load.as_str(), 0, 1, source);
    log.info(format!("Starting photo extraction from {}", source));

    let mut archive = KmzArchive::open(bytes)?;
    tracing::debug!(entries = archive.entries().len(), "opened archive");

    let kml_entry = archive.first_kml().cloned().ok_or(ExtractError::MissingKml)?;
    tracing::debug!(path = %kml_entry.path, "using KML entry");

    let kml_text = archive
        .read_text(&kml_entry)
        .map_err(|source| ExtractError::EntryRead {
            path: kml_entry.path.clone(),
            source,
        })?;
    let doc = placemark::parse_kml(&kml_text)?;
    tp.report(Stage::Load.as_str(), 1, 1, source);

    // Stage 2: Scan
    let placemarks = placemark::scan(&doc, !options.extract_all_images);
    let total = placemarks.len() as u64;
    tp.report(Stage::Scan.as_str(), total, total, "Placemarks scanned");
    tracing::debug!(placemarks = placemarks.len(), "scanned KML");

    // Stage 3: Resolve
    let mut resolver = ImageResolver::new(&mut archive, options.keep_structure);
    for (i, pm) in placemarks.iter().enumerate() {
        tp.report(Stage::Resolve.as_str(), i as u64, total, &pm.name);
        for raw in &pm.references {
            resolver.resolve(&pm.name, raw, &mut log);
        }
    }
    let images = resolver.into_images();

    // Stage 4: Assemble
    let output_archive = writer::build_output_archive(&images, &mut log, &tp)?;

    log.info(format!("Found {} placemark(s) in the KMZ", placemarks.len()));
    log.success(format!("Extracted {} photo(s) from the KMZ file", images.len()));

    Ok(ExtractionResult {
        total_placemarks: placemarks.len(),
        total_photos: images.len(),
        images,
        logs: log.into_entries(),
        output_archive,
    })
}
