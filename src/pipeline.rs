//! The media pipeline: name resolution, cache lookup and population, and
//! round-robin selection behind one entry point.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};

use crate::cache::evict::{CacheEvictor, DEFAULT_EVICTION_FRACTION};
use crate::cache::{CacheStore, DEFAULT_POPULATION_RETRIES};
use crate::catalog::CatalogClient;
use crate::download::{Downloader, DEFAULT_CONCURRENCY, MAX_ASSET_BYTES};
use crate::error::MediaError;
use crate::filter::FilterVariant;
use crate::http::HttpClient;
use crate::resolver::NameResolver;
use crate::retry::RetryConfig;
use crate::types::MediaKind;

/// Result-count ceiling for one catalog query.
pub const DEFAULT_RESULT_COUNT: u32 = 20;

/// Fewest image candidates a species needs to count as usable.
const MIN_VALID_IMAGES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub taxon_search_url: String,
    pub catalog_url: String,
    pub taxonomy_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            taxon_search_url: "https://search.macaulaylibrary.org/api/v1/find/taxon".to_string(),
            catalog_url: "https://search.macaulaylibrary.org/catalog.json".to_string(),
            taxonomy_url: "https://api.ebird.org/v2/ref/taxonomy/ebird".to_string(),
        }
    }
}

/// Library-facing settings, independent of how they were parsed.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub cache_dir: PathBuf,
    pub endpoints: Endpoints,
    pub concurrency: usize,
    pub result_count: u32,
    pub max_asset_bytes: u64,
    pub retry: RetryConfig,
    pub population_retries: u32,
    pub eviction_fraction: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("cache"),
            endpoints: Endpoints::default(),
            concurrency: DEFAULT_CONCURRENCY,
            result_count: DEFAULT_RESULT_COUNT,
            max_asset_bytes: MAX_ASSET_BYTES,
            retry: RetryConfig::default(),
            population_retries: DEFAULT_POPULATION_RETRIES,
            eviction_fraction: DEFAULT_EVICTION_FRACTION,
        }
    }
}

/// An asset picked for a caller, with the cursor to hand back next time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedMedia {
    pub species: String,
    pub path: PathBuf,
    pub extension: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeciesCheck {
    pub input: String,
    pub valid: bool,
    pub reason: String,
    /// Catalog label for the taxon, empty when none was found.
    pub detected_name: String,
}

#[derive(Debug)]
pub struct PrecacheOutcome {
    pub input: String,
    pub species: String,
    /// Number of cached assets on success.
    pub result: Result<usize, MediaError>,
}

pub struct MediaPipeline {
    config: PipelineConfig,
    resolver: Arc<NameResolver>,
    catalog: CatalogClient,
    store: CacheStore,
    evictor: CacheEvictor,
}

impl std::fmt::Debug for MediaPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MediaPipeline {
    pub fn new(config: PipelineConfig, client: Arc<dyn HttpClient>) -> Self {
        let endpoints = &config.endpoints;
        let resolver = Arc::new(NameResolver::new(
            client.clone(),
            endpoints.taxon_search_url.clone(),
            endpoints.taxonomy_url.clone(),
            config.retry,
        ));
        let catalog_for = |client: Arc<dyn HttpClient>| {
            CatalogClient::new(
                client,
                endpoints.catalog_url.clone(),
                config.result_count,
                config.retry,
            )
        };
        let downloader =
            Downloader::new(client.clone(), config.concurrency, config.max_asset_bytes);
        let store = CacheStore::new(
            config.cache_dir.clone(),
            resolver.clone(),
            catalog_for(client.clone()),
            downloader,
        )
        .with_population_retries(config.population_retries);
        let catalog = catalog_for(client);
        let evictor =
            CacheEvictor::with_fraction(config.cache_dir.clone(), config.eviction_fraction);

        Self {
            config,
            resolver,
            catalog,
            store,
            evictor,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &NameResolver {
        &self.resolver
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn evictor(&self) -> &CacheEvictor {
        &self.evictor
    }

    /// The cache key for `name`: its scientific name when one is known,
    /// otherwise `name` as given.
    pub async fn canonical_name(&self, name: &str) -> String {
        match self.resolver.scientific_name(name).await {
            Ok(sci_name) => sci_name,
            Err(e) => {
                tracing::warn!(species = %name, "No scientific name, using input: {}", e);
                name.to_string()
            }
        }
    }

    /// Serve the next asset of `kind` for `name` after the `previous` cursor.
    ///
    /// If every cached file fails validation because the directory was
    /// rotated away underneath us, the cache is repopulated once.
    pub async fn fetch(
        &self,
        name: &str,
        kind: MediaKind,
        filter: FilterVariant,
        previous: Option<usize>,
    ) -> Result<SelectedMedia, MediaError> {
        let species = self.canonical_name(name).await;
        tracing::info!(input = %name, species = %species, %kind, filter = %filter, "fetching media");

        let assets = self.store.get_assets(&species, kind, filter).await?;
        let selection = match self.store.select_next(kind, &assets, previous) {
            Ok(selection) => selection,
            Err(e @ MediaError::NoValidMedia { .. }) => {
                if self.species_dir_exists(&species, kind, filter).await {
                    return Err(e);
                }
                tracing::info!(species = %species, %kind, "cache dir vanished, repopulating");
                let assets = self.store.get_assets(&species, kind, filter).await?;
                self.store.select_next(kind, &assets, previous)?
            }
            Err(e) => return Err(e),
        };

        Ok(SelectedMedia {
            species,
            path: selection.path,
            extension: selection.extension,
            index: selection.index,
        })
    }

    async fn species_dir_exists(
        &self,
        species: &str,
        kind: MediaKind,
        filter: FilterVariant,
    ) -> bool {
        let dir = self.store.species_dir(species, kind, filter);
        tokio::fs::try_exists(&dir).await.unwrap_or(false)
    }

    /// Whether `name` has a taxon code and enough images to be used.
    pub async fn validate_species(&self, name: &str) -> Result<SpeciesCheck, MediaError> {
        let input = capwords(name);
        tracing::info!(species = %input, "checking species");

        let taxon = match self.resolver.resolve(&input).await {
            Ok(taxon) => taxon,
            Err(MediaError::NotFound { .. }) => {
                return Ok(SpeciesCheck {
                    input,
                    valid: false,
                    reason: "No taxon code found".to_string(),
                    detected_name: String::new(),
                })
            }
            Err(e) => return Err(e),
        };

        let candidates = self
            .catalog
            .list_candidates(&taxon.code, MediaKind::Images, FilterVariant::new())
            .await?;
        let (valid, reason) = if candidates.len() < MIN_VALID_IMAGES {
            (false, "One or less images found")
        } else {
            (true, "All checks passed")
        };
        Ok(SpeciesCheck {
            input,
            valid,
            reason: reason.to_string(),
            detected_name: taxon.name,
        })
    }

    /// Populate the cache for every name in `names`, a few species at a time.
    ///
    /// One species failing does not stop the others; outcomes come back in
    /// input order.
    pub async fn precache(
        &self,
        names: &[String],
        kind: MediaKind,
        filter: FilterVariant,
    ) -> Vec<PrecacheOutcome> {
        stream::iter(names)
            .map(|name| async move {
                let species = self.canonical_name(name).await;
                let result = self
                    .store
                    .get_assets(&species, kind, filter)
                    .await
                    .map(|assets| assets.len());
                match &result {
                    Ok(count) => tracing::info!(species = %species, count, "precached"),
                    Err(e) => tracing::warn!(species = %species, "Precache failed: {}", e),
                }
                PrecacheOutcome {
                    input: name.clone(),
                    species,
                    result,
                }
            })
            .buffered(self.config.concurrency)
            .collect()
            .await
    }

    /// Run one cache rotation on the blocking pool. Returns the number of
    /// species directories removed.
    pub async fn rotate(&self) -> usize {
        let evictor = self.evictor.clone();
        match tokio::task::spawn_blocking(move || evictor.rotate()).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!("Cache rotation task failed: {}", e);
                0
            }
        }
    }
}

/// Capitalize each whitespace-separated word and lowercase the rest.
fn capwords(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
