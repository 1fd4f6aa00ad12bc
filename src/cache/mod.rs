//! Directory-backed media cache keyed by species and filter variant.
//!
//! A species directory that exists and holds at least one finished asset is a
//! hit. Anything else, including a directory removed mid-request by a
//! rotation, is a miss and triggers population through the catalog and the
//! downloader.
//!
//! Population runs on its own task. A caller that gives up early does not
//! cancel it; the assets still land for whoever asks next.

pub mod evict;
pub mod paths;
pub mod select;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::catalog::CatalogClient;
use crate::download::file::is_temp_file;
use crate::download::{Batch, Downloader};
use crate::error::MediaError;
use crate::filter::FilterVariant;
use crate::resolver::NameResolver;
use crate::types::MediaKind;

use self::paths::SpeciesKey;
use self::select::Selection;

/// Extra population attempts after one that produced no files.
pub const DEFAULT_POPULATION_RETRIES: u32 = 3;

type PopulationLock = Arc<tokio::sync::Mutex<()>>;

/// The network half of the store, shared with population tasks.
struct Populator {
    resolver: Arc<NameResolver>,
    catalog: CatalogClient,
    downloader: Downloader,
}

impl Populator {
    async fn populate_with_retries(
        &self,
        species: &str,
        kind: MediaKind,
        filter: FilterVariant,
        dir: &Path,
        retries: u32,
    ) -> Result<Vec<PathBuf>, MediaError> {
        let mut cause: Option<MediaError> = None;
        for attempt in 0..=retries {
            // another caller may have filled the directory while we waited
            let listed = list_assets(dir).await?;
            if !listed.is_empty() {
                return Ok(listed);
            }
            if attempt > 0 {
                tracing::info!(
                    species = %species,
                    %kind,
                    attempt,
                    "population produced no files, retrying"
                );
            }

            let batch = self.populate(species, kind, filter, dir).await?;
            if !batch.paths.is_empty() {
                return Ok(batch.paths);
            }
            cause = batch.uniform_failure();
        }

        tracing::warn!(species = %species, %kind, "no media after population retries");
        Err(cause.unwrap_or_else(|| MediaError::NoMediaAvailable {
            species: species.to_string(),
            kind,
        }))
    }

    async fn populate(
        &self,
        species: &str,
        kind: MediaKind,
        filter: FilterVariant,
        dir: &Path,
    ) -> Result<Batch, MediaError> {
        tracing::info!(species = %species, %kind, filter = %filter, "populating cache");
        let taxon = self.resolver.resolve(species).await?;
        let candidates = self.catalog.list_candidates(&taxon.code, kind, filter).await?;
        if candidates.is_empty() {
            return Ok(Batch::default());
        }
        self.downloader.fetch_all(&candidates, dir).await
    }
}

pub struct CacheStore {
    root: PathBuf,
    populator: Arc<Populator>,
    population_retries: u32,
    populating: Mutex<HashMap<PathBuf, PopulationLock>>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("root", &self.root)
            .field("population_retries", &self.population_retries)
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    pub fn new(
        root: impl Into<PathBuf>,
        resolver: Arc<NameResolver>,
        catalog: CatalogClient,
        downloader: Downloader,
    ) -> Self {
        Self {
            root: root.into(),
            populator: Arc::new(Populator {
                resolver,
                catalog,
                downloader,
            }),
            population_retries: DEFAULT_POPULATION_RETRIES,
            populating: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_population_retries(mut self, retries: u32) -> Self {
        self.population_retries = retries;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn species_dir(&self, species: &str, kind: MediaKind, filter: FilterVariant) -> PathBuf {
        paths::species_dir(&self.root, kind, &SpeciesKey::new(species, filter))
    }

    /// Cached assets for `species`, populating the directory on a miss.
    ///
    /// `species` is the canonical (scientific) name; it is resolved to a
    /// taxon code only when the catalog has to be queried. A population that
    /// yields no files is retried up to the configured bound. If every
    /// attempt came back empty, the error is [`MediaError::UnsupportedFormat`]
    /// or [`MediaError::SizeExceeded`] when all candidates were dropped for
    /// that one reason, and [`MediaError::NoMediaAvailable`] otherwise.
    /// Concurrent callers for the same key wait for one population instead of
    /// each running their own.
    pub async fn get_assets(
        &self,
        species: &str,
        kind: MediaKind,
        filter: FilterVariant,
    ) -> Result<Vec<PathBuf>, MediaError> {
        let dir = self.species_dir(species, kind, filter);
        let cached = list_assets(&dir).await?;
        if !cached.is_empty() {
            tracing::debug!(dir = %dir.display(), count = cached.len(), "cache hit");
            return Ok(cached);
        }

        let lock = self.population_lock(&dir);
        let task = {
            let lock = lock.clone();
            let populator = self.populator.clone();
            let species = species.to_string();
            let dir = dir.clone();
            let retries = self.population_retries;
            tokio::spawn(async move {
                let _guard = lock.lock_owned().await;
                populator
                    .populate_with_retries(&species, kind, filter, &dir, retries)
                    .await
            })
        };
        let result = task.await;
        self.release_population_lock(&dir, lock);
        result?
    }

    /// Round-robin pick over `assets`, validated against this store's size cap.
    pub fn select_next(
        &self,
        kind: MediaKind,
        assets: &[PathBuf],
        previous: Option<usize>,
    ) -> Result<Selection, MediaError> {
        select::select_next(kind, assets, previous, self.populator.downloader.max_bytes())
    }

    fn population_lock(&self, dir: &Path) -> PopulationLock {
        self.populating
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(dir.to_path_buf())
            .or_default()
            .clone()
    }

    fn release_population_lock(&self, dir: &Path, lock: PopulationLock) {
        let mut map = self.populating.lock().unwrap_or_else(|e| e.into_inner());
        // one reference in the map plus ours means nobody else is waiting
        if Arc::strong_count(&lock) <= 2 {
            map.remove(dir);
        }
    }
}

/// Finished assets in `dir`, ordered by candidate index.
///
/// A missing directory is an empty listing. In-progress `.part` files and
/// subdirectories are skipped.
pub async fn list_assets(dir: &Path) -> Result<Vec<PathBuf>, MediaError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut assets = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let path = entry.path();
        if is_temp_file(&path) {
            continue;
        }
        match entry.file_type().await {
            Ok(t) if t.is_file() => assets.push(path),
            _ => {}
        }
    }

    assets.sort_by(|a, b| {
        (paths::asset_index(a).unwrap_or(usize::MAX), a)
            .cmp(&(paths::asset_index(b).unwrap_or(usize::MAX), b))
    });
    Ok(assets)
}
