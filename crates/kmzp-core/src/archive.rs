use std::io::{Cursor, Read};

use encoding_rs::SHIFT_JIS;
use zip::ZipArchive;

use crate::error::{ExtractError, Result};

/// Decode a zip entry name, trying UTF-8 first, then Shift_JIS
fn decode_zip_name(raw: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(raw) {
        return s.to_string();
    }

    // Older Japanese tools write names without the UTF-8 flag
    let (decoded, _, had_errors) = SHIFT_JIS.decode(raw);
    if !had_errors {
        return decoded.into_owned();
    }

    String::from_utf8_lossy(raw).into_owned()
}

/// One entry of the input container, in enumeration order.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Path inside the archive, as decoded from the zip header
    pub path: String,
    /// Index for `by_index` access
    pub index: usize,
    pub is_dir: bool,
    /// Uncompressed size declared in the zip header. Not trusted beyond
    /// sizing the read buffer.
    pub size: u64,
}

/// Upper bound on the buffer reserved up front for one entry.
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// Read-only view over an in-memory KMZ container.
pub struct KmzArchive {
    inner: ZipArchive<Cursor<Vec<u8>>>,
    entries: Vec<ArchiveEntry>,
}

impl KmzArchive {
    /// Open the container and enumerate its entries once.
    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        let mut inner = ZipArchive::new(Cursor::new(bytes)).map_err(ExtractError::InvalidArchive)?;

        let mut entries = Vec::with_capacity(inner.len());
        for i in 0..inner.len() {
            let entry = inner.by_index_raw(i).map_err(ExtractError::InvalidArchive)?;
            entries.push(ArchiveEntry {
                path: decode_zip_name(entry.name_raw()),
                index: i,
                is_dir: entry.is_dir(),
                size: entry.size(),
            });
        }

        Ok(Self { inner, entries })
    }

    /// All entries, directories included.
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// File entries only, in enumeration order.
    pub fn files(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter().filter(|e| !e.is_dir)
    }

    /// First file whose path ends in `.kml` (case-insensitive).
    pub fn first_kml(&self) -> Option<&ArchiveEntry> {
        self.files().find(|e| e.path.to_lowercase().ends_with(".kml"))
    }

    /// Read the raw (decompressed) bytes of an entry.
    pub fn read_bytes(&mut self, entry: &ArchiveEntry) -> zip::result::ZipResult<Vec<u8>> {
        let mut file = self.inner.by_index(entry.index)?;
        let mut bytes = Vec::with_capacity(entry.size.min(MAX_PREALLOC) as usize);
        file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Read an entry as text. A UTF-8 BOM is dropped and invalid sequences
    /// are replaced rather than rejected.
    pub fn read_text(&mut self, entry: &ArchiveEntry) -> zip::result::ZipResult<String> {
        let bytes = self.read_bytes(entry)?;
        let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes);
        match std::str::from_utf8(body) {
            Ok(s) => Ok(s.to_string()),
            Err(e) => {
                tracing::debug!(path = %entry.path, error = %e, "entry is not valid UTF-8, decoding lossily");
                Ok(String::from_utf8_lossy(body).into_owned())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(files: &[(&str, &[u8])], dirs: &[&str]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for dir in dirs {
            zip.add_directory(*dir, options).unwrap();
        }
        for (name, data) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_open_lists_entries_in_order() {
        let bytes = build_zip(&[("doc.kml", b"<kml/>"), ("images/a.jpg", b"abc")], &["images/"]);
        let archive = KmzArchive::open(bytes).unwrap();

        let paths: Vec<&str> = archive.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["images/", "doc.kml", "images/a.jpg"]);
        assert!(archive.entries()[0].is_dir);

        let files: Vec<&str> = archive.files().map(|e| e.path.as_str()).collect();
        assert_eq!(files, vec!["doc.kml", "images/a.jpg"]);
    }

    #[test]
    fn test_first_kml_is_case_insensitive_and_first_wins() {
        let bytes = build_zip(&[("a.txt", b"x"), ("Doc.KML", b"<kml/>"), ("other.kml", b"<kml/>")], &[]);
        let archive = KmzArchive::open(bytes).unwrap();
        assert_eq!(archive.first_kml().unwrap().path, "Doc.KML");
    }

    #[test]
    fn test_read_bytes_and_text() {
        let bytes = build_zip(&[("doc.kml", b"\xEF\xBB\xBF<kml/>"), ("a.jpg", &[0xFF, 0xD8, 0x00])], &[]);
        let mut archive = KmzArchive::open(bytes).unwrap();

        let kml = archive.first_kml().cloned().unwrap();
        assert_eq!(archive.read_text(&kml).unwrap(), "<kml/>");

        let jpg = archive.files().nth(1).cloned().unwrap();
        assert_eq!(archive.read_bytes(&jpg).unwrap(), vec![0xFF, 0xD8, 0x00]);
    }

    #[test]
    fn test_read_bytes_ignores_oversized_header() {
        let bytes = build_zip(&[("a.jpg", b"abc")], &[]);
        let mut archive = KmzArchive::open(bytes).unwrap();

        let mut jpg = archive.files().next().cloned().unwrap();
        assert_eq!(jpg.size, 3);
        jpg.size = u64::MAX;
        assert_eq!(archive.read_bytes(&jpg).unwrap(), b"abc");
    }

    #[test]
    fn test_open_rejects_non_zip() {
        let err = KmzArchive::open(b"definitely not a zip".to_vec()).err().unwrap();
        assert!(matches!(err, ExtractError::InvalidArchive(_)));
    }

    #[test]
    fn test_decode_zip_name_shift_jis() {
        // "写真.jpg" in Shift_JIS
        let raw = [0x8E, 0xCA, 0x90, 0x5E, b'.', b'j', b'p', b'g'];
        assert_eq!(decode_zip_name(&raw), "写真.jpg");
        assert_eq!(decode_zip_name(b"plain.jpg"), "plain.jpg");
    }
}
