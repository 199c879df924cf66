//! Fatal errors that abort an extraction run.
//!
//! Anything recoverable (bad data URL, missing file, duplicate name) is not an
//! error here; it ends up as a [`crate::LogEntry`] in the result instead.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Input bytes are not a readable zip container
    #[error("not a valid KMZ archive: {0}")]
    InvalidArchive(#[source] zip::result::ZipError),

    /// No entry ending in `.kml` was found
    #[error("could not find a KML file inside the KMZ")]
    MissingKml,

    /// The KML entry is not well-formed XML
    #[error("failed to parse KML: {0}")]
    Parse(#[from] roxmltree::Error),

    /// The KML entry was listed but could not be read back
    #[error("failed to read archive entry \"{path}\": {source}")]
    EntryRead {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },

    /// Writing the output archive failed
    #[error("failed to build output archive: {0}")]
    Assemble(#[source] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ExtractError>;
