//! Scoresheet image source: raw bytes plus a declared media type.

use std::sync::Arc;

use thiserror::Error;

/// Image encodings accepted by the recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Jpeg,
    Png,
    Webp,
    Heic,
    Heif,
}

#[derive(Debug, Error)]
#[error("unsupported image type: {0}")]
pub struct UnsupportedMediaType(pub String);

impl MediaType {
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Webp => "image/webp",
            MediaType::Heic => "image/heic",
            MediaType::Heif => "image/heif",
        }
    }

    /// Infer the media type from a file extension (case-insensitive, no dot).
    pub fn from_extension(ext: &str) -> Result<Self, UnsupportedMediaType> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(MediaType::Jpeg),
            "png" => Ok(MediaType::Png),
            "webp" => Ok(MediaType::Webp),
            "heic" => Ok(MediaType::Heic),
            "heif" => Ok(MediaType::Heif),
            other => Err(UnsupportedMediaType(other.to_string())),
        }
    }

    /// Parse a MIME string such as `image/jpeg`.
    pub fn from_mime(mime: &str) -> Result<Self, UnsupportedMediaType> {
        let lower = mime.trim().to_ascii_lowercase();
        match lower.strip_prefix("image/") {
            Some(sub) => Self::from_extension(sub),
            None => Err(UnsupportedMediaType(lower)),
        }
    }
}

/// A photographed scoresheet.
///
/// Cloning is cheap; the bytes are shared between concurrently running stages.
#[derive(Clone)]
pub struct ScoresheetImage {
    bytes: Arc<[u8]>,
    media_type: MediaType,
}

impl ScoresheetImage {
    #[must_use]
    pub fn new(bytes: impl Into<Arc<[u8]>>, media_type: MediaType) -> Self {
        Self {
            bytes: bytes.into(),
            media_type,
        }
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub const fn media_type(&self) -> MediaType {
        self.media_type
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Image bytes are never useful in logs.
impl std::fmt::Debug for ScoresheetImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoresheetImage")
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}
