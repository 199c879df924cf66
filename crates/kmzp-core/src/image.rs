use std::borrow::Cow;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

/// Standard alphabet, padding optional (data URLs in the wild often drop it).
const INLINE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Stored representation of an image's content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageData {
    /// Base64 payload taken from a `data:` URL
    Base64(String),
    /// Raw bytes read from an archive entry
    Bytes(Vec<u8>),
}

impl ImageData {
    /// Decoded content as written to the output archive.
    pub fn to_bytes(&self) -> Result<Cow<'_, [u8]>, base64::DecodeError> {
        match self {
            ImageData::Base64(payload) => INLINE_ENGINE.decode(payload).map(Cow::Owned),
            ImageData::Bytes(bytes) => Ok(Cow::Borrowed(bytes)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractedImage {
    /// Final output file name, unique within one run
    pub name: String,
    pub data: ImageData,
    /// Declared MIME type for inline images, guessed from the path otherwise
    pub mime_type: Option<String>,
    /// Entry the bytes came from; `None` for inline images
    pub original_archive_path: Option<String>,
}

impl ExtractedImage {
    pub fn is_inline(&self) -> bool {
        self.original_archive_path.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_decodes_with_and_without_padding() {
        assert_eq!(ImageData::Base64("QUJD".into()).to_bytes().unwrap().as_ref(), b"ABC");
        assert_eq!(ImageData::Base64("QUI=".into()).to_bytes().unwrap().as_ref(), b"AB");
        assert_eq!(ImageData::Base64("QUI".into()).to_bytes().unwrap().as_ref(), b"AB");
        assert!(ImageData::Base64("!!!".into()).to_bytes().is_err());
    }

    #[test]
    fn test_bytes_borrowed() {
        let data = ImageData::Bytes(vec![1, 2, 3]);
        assert!(matches!(data.to_bytes().unwrap(), Cow::Borrowed(_)));
    }
}
