use thiserror::Error;

use crate::http::TransportError;
use crate::types::MediaKind;

/// Whole-operation failures surfaced to callers of the pipeline.
///
/// Per-item download problems never reach this type directly; they are
/// logged and dropped in [`crate::download`], and only show up here as
/// `NoMediaAvailable` when they empty an entire population attempt.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("No taxon found for '{name}'")]
    NotFound { name: String },

    #[error("HTTP error {status} while fetching {url}")]
    Upstream { status: u16, url: String },

    #[error("No accepted extension for content type '{content_type}'")]
    UnsupportedFormat { content_type: String },

    #[error("No {kind} found for {species}")]
    NoMediaAvailable { species: String, kind: MediaKind },

    #[error("No valid {kind} among {candidates} cached files")]
    NoValidMedia { kind: MediaKind, candidates: usize },

    #[error("Media size {size} exceeds limit of {limit} bytes")]
    SizeExceeded { size: u64, limit: u64 },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),
}

impl MediaError {
    pub fn invalid_url(url: &str, reason: impl std::fmt::Display) -> Self {
        MediaError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the underlying cause is a missing file or directory, which
    /// callers treat as a cache miss rather than a failure.
    pub fn is_not_found_io(&self) -> bool {
        matches!(self, MediaError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_has_status_and_url() {
        let e = MediaError::Upstream {
            status: 503,
            url: "https://example.org/x".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("https://example.org/x"));
    }

    #[test]
    fn test_no_media_message_has_context() {
        let e = MediaError::NoMediaAvailable {
            species: "Cardinalis cardinalis".into(),
            kind: MediaKind::Songs,
        };
        assert_eq!(e.to_string(), "No songs found for Cardinalis cardinalis");
    }

    #[test]
    fn test_not_found_io() {
        let e = MediaError::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(e.is_not_found_io());
        let e = MediaError::Io(std::io::Error::other("disk full"));
        assert!(!e.is_not_found_io());
        let e = MediaError::NotFound { name: "x".into() };
        assert!(!e.is_not_found_io());
    }
}
