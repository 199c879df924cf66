use regex::Regex;
use std::sync::LazyLock;

use crate::archive::{ArchiveEntry, KmzArchive};
use crate::file_name::generate_file_name;
use crate::image::{ExtractedImage, ImageData};
use crate::path_norm;
use crate::run_log::RunLog;

static DATA_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^data:([A-Za-z+/-]+);base64,(.+)$").unwrap());

/// MIME substring -> extension, first match wins
const MIME_EXTENSIONS: &[(&str, &str)] = &[
    ("png", ".png"),
    ("gif", ".gif"),
    ("jpeg", ".jpg"),
    ("webp", ".webp"),
    ("bmp", ".bmp"),
];

const DEFAULT_EXTENSION: &str = ".jpg";

/// How a raw reference string should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind<'r> {
    /// `http://` or `https://`, never fetched
    Remote,
    /// `data:` URL
    Inline(&'r str),
    /// Path to look up inside the archive
    Archive(&'r str),
}

pub fn classify(raw: &str) -> ReferenceKind<'_> {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        ReferenceKind::Remote
    } else if raw.starts_with("data:") {
        ReferenceKind::Inline(raw)
    } else {
        ReferenceKind::Archive(raw)
    }
}

/// What happened to one reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Remote,
    Extracted,
    MalformedDataUrl,
    NotFound,
    Duplicate,
    ReadFailed,
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    MIME_EXTENSIONS
        .iter()
        .find(|(needle, _)| mime.contains(*needle))
        .map_or(DEFAULT_EXTENSION, |&(_, ext)| ext)
}

/// Lower-cased extension of the entry's file name, with leading dot.
fn extension_for_path(path: &str) -> String {
    match path_norm::file_name(path).rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => format!(".{}", ext.to_lowercase()),
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

/// Find the archive file a reference points at.
///
/// Tiers are tried in order over the whole listing: exact normalized path,
/// then path suffix (`.../<ref>`), then bare file name. Within a tier the
/// first entry in enumeration order wins.
pub fn find_entry<'e, I>(files: I, reference: &str) -> Option<&'e ArchiveEntry>
where
    I: IntoIterator<Item = &'e ArchiveEntry>,
{
    let wanted = path_norm::normalize(reference);
    if wanted.is_empty() {
        return None;
    }
    let wanted_suffix = format!("/{}", wanted);
    let wanted_name = path_norm::file_name(wanted);

    let files: Vec<&ArchiveEntry> = files.into_iter().filter(|e| !e.is_dir).collect();

    files
        .iter()
        .find(|e| path_norm::normalize(&e.path) == wanted)
        .or_else(|| files.iter().find(|e| path_norm::normalize(&e.path).ends_with(&wanted_suffix)))
        .or_else(|| {
            files
                .iter()
                .find(|e| !wanted_name.is_empty() && path_norm::file_name(path_norm::normalize(&e.path)) == wanted_name)
        })
        .copied()
}

/// Turns raw references into [`ExtractedImage`]s for one run, keeping
/// output names unique.
pub struct ImageResolver<'a> {
    archive: &'a mut KmzArchive,
    keep_structure: bool,
    images: Vec<ExtractedImage>,
}

impl<'a> ImageResolver<'a> {
    pub fn new(archive: &'a mut KmzArchive, keep_structure: bool) -> Self {
        Self {
            archive,
            keep_structure,
            images: Vec::new(),
        }
    }

    pub fn images(&self) -> &[ExtractedImage] {
        &self.images
    }

    pub fn into_images(self) -> Vec<ExtractedImage> {
        self.images
    }

    fn is_taken(&self, name: &str) -> bool {
        self.images.iter().any(|img| img.name == name)
    }

    pub fn resolve(&mut self, placemark: &str, raw: &str, log: &mut RunLog) -> Resolution {
        match classify(raw) {
            ReferenceKind::Remote => Resolution::Remote,
            ReferenceKind::Inline(url) => self.resolve_inline(placemark, url, log),
            ReferenceKind::Archive(path) => self.resolve_archive(placemark, path, log),
        }
    }

    fn resolve_inline(&mut self, placemark: &str, url: &str, log: &mut RunLog) -> Resolution {
        let Some(caps) = DATA_URL_RE.captures(url) else {
            log.warning(format!("Invalid data URL format for placemark \"{}\"", placemark));
            return Resolution::MalformedDataUrl;
        };
        let mime_type = caps[1].to_string();
        let data = ImageData::Base64(caps[2].to_string());

        if let Err(e) = data.to_bytes() {
            log.warning(format!(
                "Invalid base64 payload in data URL for placemark \"{}\": {}",
                placemark, e
            ));
            return Resolution::MalformedDataUrl;
        }

        let name = generate_file_name(placemark, extension_for_mime(&mime_type), self.keep_structure);
        if self.is_taken(&name) {
            log.warning(format!("File \"{}\" was already extracted, skipping", name));
            return Resolution::Duplicate;
        }

        log.success(format!(
            "Extracted base64 image from placemark \"{}\" as \"{}\"",
            placemark, name
        ));
        self.images.push(ExtractedImage {
            name,
            data,
            mime_type: Some(mime_type),
            original_archive_path: None,
        });
        Resolution::Extracted
    }

    fn resolve_archive(&mut self, placemark: &str, reference: &str, log: &mut RunLog) -> Resolution {
        let Some(entry) = find_entry(self.archive.entries(), reference).cloned() else {
            log.warning(format!(
                "File \"{}\" not found in KMZ for placemark \"{}\"",
                reference, placemark
            ));
            return Resolution::NotFound;
        };
        tracing::debug!(reference, entry = %entry.path, "resolved archive reference");

        let name = generate_file_name(placemark, &extension_for_path(&entry.path), self.keep_structure);
        if self.is_taken(&name) {
            log.warning(format!("File \"{}\" was already extracted, skipping", name));
            return Resolution::Duplicate;
        }

        let bytes = match self.archive.read_bytes(&entry) {
            Ok(bytes) => bytes,
            Err(e) => {
                log.error(format!("Failed to read \"{}\" from KMZ: {}", entry.path, e));
                return Resolution::ReadFailed;
            }
        };

        log.success(format!("Extracted \"{}\" from KMZ as \"{}\"", entry.path, name));
        self.images.push(ExtractedImage {
            name,
            data: ImageData::Bytes(bytes),
            mime_type: mime_guess::from_path(&entry.path).first().map(|m| m.to_string()),
            original_archive_path: Some(entry.path),
        });
        Resolution::Extracted
    }
}
