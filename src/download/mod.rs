//! Download engine: fetches a batch of catalog candidates into one cache
//! directory with bounded concurrency.
//!
//! Per-item failures (bad status, missing or oversized length, unsupported
//! content type) are logged and dropped so the batch yields whatever did
//! succeed. They are kept on the [`Batch`] so a caller can tell why an empty
//! batch came back empty. A transport failure is different: it means the
//! connection itself is broken, and is returned to the caller once the rest
//! of the batch has settled.

pub mod error;
pub mod extension;
pub mod file;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};

use crate::catalog::AssetCandidate;
use crate::error::MediaError;
use crate::http::HttpClient;

use self::error::DownloadError;
use self::extension::MimeTable;

/// Number of candidate fetches allowed in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Hard cap on asset size, declared or actual.
pub const MAX_ASSET_BYTES: u64 = 4_000_000;

/// Outcome of one [`Downloader::fetch_all`] call.
#[derive(Debug, Default)]
pub struct Batch {
    /// Saved assets, ordered by candidate index.
    pub paths: Vec<PathBuf>,
    /// Per-item failures that were dropped.
    pub failures: Vec<DownloadError>,
}

impl Batch {
    /// The error to surface when nothing was saved and every candidate was
    /// dropped for the same reason: an unsupported content type, or a size
    /// over the cap. Mixed failures have no single cause and return `None`.
    pub fn uniform_failure(&self) -> Option<MediaError> {
        if !self.paths.is_empty() {
            return None;
        }
        let first = self.failures.first()?;
        match first {
            DownloadError::UnsupportedFormat { content_type, .. }
                if self
                    .failures
                    .iter()
                    .all(|f| matches!(f, DownloadError::UnsupportedFormat { .. })) =>
            {
                Some(MediaError::UnsupportedFormat {
                    content_type: content_type.clone(),
                })
            }
            DownloadError::SizeExceeded { size, limit, .. }
                if self
                    .failures
                    .iter()
                    .all(|f| matches!(f, DownloadError::SizeExceeded { .. })) =>
            {
                Some(MediaError::SizeExceeded {
                    size: *size,
                    limit: *limit,
                })
            }
            _ => None,
        }
    }
}

pub struct Downloader {
    client: Arc<dyn HttpClient>,
    concurrency: usize,
    max_bytes: u64,
    mime: MimeTable,
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("concurrency", &self.concurrency)
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

impl Downloader {
    pub fn new(client: Arc<dyn HttpClient>, concurrency: usize, max_bytes: u64) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
            max_bytes,
            mime: MimeTable::standard(),
        }
    }

    pub fn with_mime_table(mut self, mime: MimeTable) -> Self {
        self.mime = mime;
        self
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Fetch every candidate into `dir`, at most `concurrency` at a time.
    ///
    /// Candidate `i` is stored as `<i>.<ext>`. Returned paths are ordered by
    /// candidate index with duplicates removed; completion order is not
    /// preserved.
    pub async fn fetch_all(
        &self,
        candidates: &[AssetCandidate],
        dir: &Path,
    ) -> Result<Batch, MediaError> {
        tokio::fs::create_dir_all(dir).await?;

        let fetches: Vec<_> = candidates
            .iter()
            .enumerate()
            .map(|(index, candidate)| async move {
                (index, self.fetch_one(candidate, dir, index).await)
            })
            .collect();
        let mut results: Vec<(usize, Result<PathBuf, DownloadError>)> =
            stream::iter(fetches)
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
        results.sort_by_key(|(index, _)| *index);

        let mut seen = HashSet::new();
        let mut batch = Batch::default();
        let mut fatal: Option<DownloadError> = None;

        for (index, result) in results {
            match result {
                Ok(path) => {
                    if seen.insert(path.clone()) {
                        batch.paths.push(path);
                    }
                }
                Err(e) if e.is_fatal() => {
                    tracing::warn!("Transport failure for candidate {}: {}", index, e);
                    if fatal.is_none() {
                        fatal = Some(e);
                    }
                }
                Err(e) => {
                    tracing::info!("Dropping candidate {}: {}", index, e);
                    batch.failures.push(e);
                }
            }
        }

        tracing::info!(
            dir = %dir.display(),
            candidates = candidates.len(),
            saved = batch.paths.len(),
            dropped = batch.failures.len(),
            "download batch finished"
        );

        match fatal {
            Some(DownloadError::Transport(e)) => Err(MediaError::Transport(e)),
            _ => Ok(batch),
        }
    }

    async fn fetch_one(
        &self,
        candidate: &AssetCandidate,
        dir: &Path,
        index: usize,
    ) -> Result<PathBuf, DownloadError> {
        let response = self.client.get(&candidate.url).await?;
        file::save_response(
            response,
            dir,
            index,
            candidate.kind,
            &self.mime,
            self.max_bytes,
        )
        .await
    }
}
