//! Content-type to file extension mapping.

use std::collections::HashMap;

use crate::types::MediaKind;

/// Known extensions per MIME type, in the order a system MIME database
/// lists them.
const STANDARD: &[(&str, &[&str])] = &[
    ("image/png", &["png"]),
    ("image/jpeg", &["jpg", "jpe", "jpeg"]),
    ("image/pjpeg", &["jpg", "jpeg"]),
    ("image/gif", &["gif"]),
    ("image/webp", &["webp"]),
    ("image/bmp", &["bmp"]),
    ("image/tiff", &["tiff", "tif"]),
    ("audio/mpeg", &["mp3", "mp2"]),
    ("audio/mp3", &["mp3"]),
    ("audio/wav", &["wav"]),
    ("audio/x-wav", &["wav"]),
    ("audio/wave", &["wav"]),
    ("audio/ogg", &["ogg", "oga"]),
    ("audio/mp4", &["m4a", "mp4"]),
    ("audio/x-aiff", &["aif", "aiff"]),
];

#[derive(Debug, Clone)]
pub struct MimeTable {
    entries: HashMap<&'static str, &'static [&'static str]>,
}

impl Default for MimeTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl MimeTable {
    pub fn standard() -> Self {
        Self {
            entries: STANDARD.iter().copied().collect(),
        }
    }

    /// A table that knows no types; every lookup fails.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn with(mut self, content_type: &'static str, extensions: &'static [&'static str]) -> Self {
        self.entries.insert(content_type, extensions);
        self
    }

    /// All extensions known for a `content-type` header value. Parameters
    /// such as `; charset=...` are ignored.
    pub fn extensions(&self, content_type: &str) -> &'static [&'static str] {
        let essence = essence(content_type);
        self.entries
            .get(essence.as_str())
            .copied()
            .unwrap_or_default()
    }

    /// The extension to store an asset of `kind` under, or `None` if this
    /// content type has no extension `kind` accepts.
    pub fn choose(&self, content_type: &str, kind: MediaKind) -> Option<&'static str> {
        let known = self.extensions(content_type);
        kind.accepted_extensions()
            .iter()
            .copied()
            .find(|ext| known.contains(ext))
    }
}

fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
