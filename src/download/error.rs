use thiserror::Error;

use crate::http::TransportError;

/// Failure to fetch one candidate asset.
///
/// Everything except a transport failure is a per-item miss: the candidate
/// is logged and dropped while the rest of the batch carries on.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP error {status} downloading {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Asset {url} is still being processed upstream")]
    StillProcessing { url: String },

    #[error("No content-length for {url}")]
    MissingLength { url: String },

    #[error("Asset {url} is {size} bytes, over the {limit} byte limit")]
    SizeExceeded { url: String, size: u64, limit: u64 },

    #[error("No accepted extension for content type '{content_type}' ({url})")]
    UnsupportedFormat { url: String, content_type: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Disk error: {0}")]
    Disk(#[from] std::io::Error),
}

/// Catalog status for media that exists but has not finished processing.
pub const STILL_PROCESSING: u16 = 476;

impl DownloadError {
    /// Whether this failure should abort the whole batch rather than just
    /// the one candidate.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DownloadError::Transport(_))
    }
}
