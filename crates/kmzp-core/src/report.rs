use std::path::Path;

use serde::Serialize;

use crate::run_log::LogEntry;
use crate::{ExtractOptions, ExtractionResult};

#[derive(Debug, Serialize)]
struct ReportImage<'a> {
    name: &'a str,
    /// Archive path, or "inline" for data URLs
    source: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'a str>,
}

/// JSON summary of one run, written next to (or instead of) console output.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    source: &'a str,
    options: &'a ExtractOptions,
    total_placemarks: usize,
    total_photos: usize,
    images: Vec<ReportImage<'a>>,
    logs: &'a [LogEntry],
}

impl<'a> RunReport<'a> {
    pub fn new(source: &'a str, options: &'a ExtractOptions, result: &'a ExtractionResult) -> Self {
        let images = result
            .images
            .iter()
            .map(|img| ReportImage {
                name: &img.name,
                source: img.original_archive_path.as_deref().unwrap_or("inline"),
                mime_type: img.mime_type.as_deref(),
            })
            .collect();

        Self {
            source,
            options,
            total_placemarks: result.total_placemarks,
            total_photos: result.total_photos,
            images,
            logs: &result.logs,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}
