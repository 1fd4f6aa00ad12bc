//! Round-robin selection over a species' cached assets.
//!
//! The caller owns the cursor: it passes in the index it served last time
//! (or `None`) and stores the returned index for next time.

use std::path::{Path, PathBuf};

use crate::error::MediaError;
use crate::types::MediaKind;

/// The asset chosen by [`select_next`] and the cursor to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub path: PathBuf,
    pub extension: String,
    pub index: usize,
}

/// Whether a cached file may be served: its extension is accepted for
/// `kind` and it is smaller than `max_bytes`.
///
/// A file that can no longer be stat'ed (for example, deleted by a cache
/// rotation) is not valid.
pub fn is_valid_asset(path: &Path, kind: MediaKind, max_bytes: u64) -> bool {
    let ext_ok = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| kind.accepts_extension(e));
    if !ext_ok {
        return false;
    }
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.len() < max_bytes,
        Err(e) => {
            tracing::debug!("Cannot stat {}: {}", path.display(), e);
            false
        }
    }
}

/// Pick the next valid asset after `previous`, scanning circularly.
///
/// Starts at `(previous + 1) % len` (or `0` with no previous selection) and
/// returns the first asset that passes [`is_valid_asset`]. Consecutive calls
/// that feed the returned index back never repeat an asset unless only one
/// is valid.
pub fn select_next(
    kind: MediaKind,
    assets: &[PathBuf],
    previous: Option<usize>,
    max_bytes: u64,
) -> Result<Selection, MediaError> {
    let len = assets.len();
    if len == 0 {
        return Err(MediaError::NoValidMedia {
            kind,
            candidates: 0,
        });
    }

    let start = previous.map_or(0, |p| (p % len + 1) % len);
    tracing::debug!(previous = ?previous, start, len, "selecting asset");

    for offset in 0..len {
        let index = (start + offset) % len;
        let path = &assets[index];
        if is_valid_asset(path, kind, max_bytes) {
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_ascii_lowercase();
            return Ok(Selection {
                path: path.clone(),
                extension,
                index,
            });
        }
        tracing::debug!("Skipping invalid asset {}", path.display());
    }

    Err(MediaError::NoValidMedia {
        kind,
        candidates: len,
    })
}
