use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{ExtractError, Result};
use crate::image::ExtractedImage;
use crate::run_log::RunLog;
use crate::{Stage, ThrottledProgress};

/// Build the output zip: one stored entry per image, named by `image.name`.
///
/// An image whose content cannot be decoded is logged and left out; the rest
/// of the archive is still written.
pub fn build_output_archive(
    images: &[ExtractedImage],
    log: &mut RunLog,
    progress: &ThrottledProgress<'_>,
) -> Result<Vec<u8>> {
    // Photos are already compressed
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let total = images.len() as u64;

    for (i, image) in images.iter().enumerate() {
        progress.report(Stage::Assemble.as_str(), i as u64, total, &image.name);

        let bytes = match image.data.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                log.error(format!("Failed to decode \"{}\": {}", image.name, e));
                continue;
            }
        };

        zip.start_file(image.name.as_str(), options)
            .map_err(ExtractError::Assemble)?;
        zip.write_all(&bytes)?;
    }

    let cursor = zip.finish().map_err(ExtractError::Assemble)?;
    Ok(cursor.into_inner())
}

/// Write the output archive to `dest`.
///
/// Unless `force` is set an existing file is left alone and the first free
/// `name(N).zip` next to it is used instead. Returns the path written.
pub fn write_output_file(dest: &Path, bytes: &[u8], force: bool) -> anyhow::Result<PathBuf> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let target = if force || !dest.exists() {
        dest.to_path_buf()
    } else {
        free_path(dest)
    };

    fs::write(&target, bytes)?;
    Ok(target)
}

fn free_path(dest: &Path) -> PathBuf {
    let stem = dest.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = dest.extension().and_then(|s| s.to_str()).unwrap_or("");
    let dir = dest.parent().unwrap_or_else(|| Path::new(""));

    let mut counter = 1u32;
    loop {
        let new_name = if ext.is_empty() {
            format!("{}({})", stem, counter)
        } else {
            format!("{}({}).{}", stem, counter, ext)
        };
        let candidate = dir.join(&new_name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageData;
    use crate::run_log::LogStatus;
    use std::io::Read;
    use tempfile::tempdir;

    fn image(name: &str, data: ImageData) -> ExtractedImage {
        ExtractedImage {
            name: name.to_string(),
            data,
            mime_type: None,
            original_archive_path: None,
        }
    }

    #[test]
    fn test_build_output_archive() {
        let images = vec![
            image("Roof.png", ImageData::Base64("QUJD".into())),
            image("Pole 12.jpg", ImageData::Bytes(vec![0xFF, 0xD8, 0xFF])),
            image("Broken.png", ImageData::Base64("%%%".into())),
        ];
        let mut log = RunLog::new();
        let noop = |_: &str, _: u64, _: u64, _: &str| {};
        let progress = ThrottledProgress::new(&noop);

        let bytes = build_output_archive(&images, &mut log, &progress).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut roof = Vec::new();
        archive.by_name("Roof.png").unwrap().read_to_end(&mut roof).unwrap();
        assert_eq!(roof, b"ABC");

        let mut pole = Vec::new();
        archive.by_name("Pole 12.jpg").unwrap().read_to_end(&mut pole).unwrap();
        assert_eq!(pole, vec![0xFF, 0xD8, 0xFF]);

        assert_eq!(log.entries().len(), 1);
        assert_eq!(log.entries()[0].status, LogStatus::Error);
    }

    #[test]
    fn test_build_empty_archive() {
        let mut log = RunLog::new();
        let noop = |_: &str, _: u64, _: u64, _: &str| {};
        let bytes = build_output_archive(&[], &mut log, &ThrottledProgress::new(&noop)).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }

    #[test]
    fn test_write_output_file_avoids_overwrite() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("site_extracted_photos.zip");

        assert_eq!(write_output_file(&dest, b"one", false).unwrap(), dest);
        let second = write_output_file(&dest, b"two", false).unwrap();
        assert_eq!(second, dir.path().join("site_extracted_photos(1).zip"));
        assert_eq!(fs::read(&dest).unwrap(), b"one");

        assert_eq!(write_output_file(&dest, b"three", true).unwrap(), dest);
        assert_eq!(fs::read(&dest).unwrap(), b"three");
    }

    #[test]
    fn test_write_output_file_creates_parent() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("nested/out.zip");
        write_output_file(&dest, b"x", false).unwrap();
        assert!(dest.exists());
    }
}
