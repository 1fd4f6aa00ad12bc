//! Probabilistic cache rotation.
//!
//! Each rotation deletes a uniformly random fraction of the species
//! directories across both media kinds. It is not LRU and takes no lock:
//! a concurrent reader that loses its directory sees a cache miss and
//! repopulates.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::types::MediaKind;

/// Default share of species directories removed per rotation.
pub const DEFAULT_EVICTION_FRACTION: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct CacheEvictor {
    root: PathBuf,
    fraction: f64,
}

impl CacheEvictor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_fraction(root, DEFAULT_EVICTION_FRACTION)
    }

    pub fn with_fraction(root: impl Into<PathBuf>, fraction: f64) -> Self {
        Self {
            root: root.into(),
            fraction: fraction.clamp(0.0, 1.0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of directories a rotation over `total` removes: `total *
    /// fraction`, rounded half to even.
    pub fn eviction_count(&self, total: usize) -> usize {
        ((total as f64 * self.fraction).round_ties_even() as usize).min(total)
    }

    /// Delete a random subset of species directories. Never fails; returns
    /// how many directories were actually removed.
    pub fn rotate(&self) -> usize {
        self.rotate_with(&mut rand::thread_rng())
    }

    pub fn rotate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let dirs = self.species_dirs();
        let count = self.eviction_count(dirs.len());
        tracing::info!(
            root = %self.root.display(),
            total = dirs.len(),
            count,
            "rotating cache"
        );

        let mut removed = 0;
        for dir in dirs.choose_multiple(rng, count) {
            match std::fs::remove_dir_all(dir) {
                Ok(()) => {
                    tracing::debug!("Removed {}", dir.display());
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!("Already gone: {}", dir.display());
                }
                Err(e) => {
                    tracing::warn!("Failed to remove {}: {}", dir.display(), e);
                }
            }
        }
        removed
    }

    /// Every species directory under `<root>/images` and `<root>/songs`.
    /// A missing kind directory contributes nothing.
    pub fn species_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        for kind in MediaKind::ALL {
            let kind_dir = self.root.join(kind.as_str());
            let entries = match std::fs::read_dir(&kind_dir) {
                Ok(entries) => entries,
                Err(e) => {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!("Cannot list {}: {}", kind_dir.display(), e);
                    }
                    continue;
                }
            };
            for entry in entries.flatten() {
                if entry.file_type().is_ok_and(|t| t.is_dir()) {
                    dirs.push(entry.path());
                }
            }
        }
        dirs.sort();
        dirs
    }
}

/// Rotate the cache every `interval` until `cancellation` fires.
///
/// Rotation runs on the blocking pool since it is plain filesystem work.
pub async fn run_rotation_daemon(
    evictor: CacheEvictor,
    interval: Duration,
    cancellation: CancellationToken,
) {
    tracing::info!(
        root = %evictor.root().display(),
        interval_secs = interval.as_secs(),
        "Starting cache rotation daemon"
    );

    loop {
        tokio::select! {
            _ = cancellation.cancelled() => {
                tracing::info!("Cache rotation daemon shutting down");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                let job = evictor.clone();
                match tokio::task::spawn_blocking(move || job.rotate()).await {
                    Ok(removed) => tracing::info!(removed, "cache rotation finished"),
                    Err(e) => tracing::warn!("Cache rotation task failed: {}", e),
                }
            }
        }
    }
}
