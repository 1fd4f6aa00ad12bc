//! Catalog listing queries: taxon code + media kind + filter variant to a
//! ranked list of candidate asset URLs.

use std::sync::Arc;

use reqwest::Url;
use serde::Deserialize;

use crate::error::MediaError;
use crate::filter::FilterVariant;
use crate::http::HttpClient;
use crate::retry::{self, RetryConfig};
use crate::types::MediaKind;

/// A remote asset the catalog offered for a taxon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetCandidate {
    pub url: String,
    pub kind: MediaKind,
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    results: CatalogResults,
}

#[derive(Debug, Deserialize)]
struct CatalogResults {
    #[serde(default)]
    content: Vec<CatalogItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogItem {
    #[serde(default)]
    media_url: Option<String>,
    #[serde(default)]
    preview_url: Option<String>,
}

pub struct CatalogClient {
    client: Arc<dyn HttpClient>,
    catalog_url: String,
    count: u32,
    retry: RetryConfig,
}

impl std::fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("catalog_url", &self.catalog_url)
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}

impl CatalogClient {
    /// `count` caps how many candidates one query returns. It should leave a
    /// margin over what callers need, since some assets are still being
    /// processed upstream and fail to download.
    pub fn new(
        client: Arc<dyn HttpClient>,
        catalog_url: impl Into<String>,
        count: u32,
        retry: RetryConfig,
    ) -> Self {
        Self {
            client,
            catalog_url: catalog_url.into(),
            count,
            retry,
        }
    }

    pub fn listing_url(
        &self,
        taxon_code: &str,
        kind: MediaKind,
        filter: FilterVariant,
    ) -> Result<String, MediaError> {
        let count = self.count.to_string();
        let mut params: Vec<(&str, String)> = vec![
            ("searchField", "species".to_string()),
            ("taxonCode", taxon_code.to_string()),
            ("count", count),
            ("mediaType", kind.catalog_code().to_string()),
        ];
        params.extend(filter.query_params());
        Url::parse_with_params(&self.catalog_url, &params)
            .map(String::from)
            .map_err(|e| MediaError::invalid_url(&self.catalog_url, e))
    }

    /// Candidate URLs in the catalog's own ranking.
    ///
    /// A taxon with no media yields an empty list, not an error. Preview
    /// URLs are returned instead of full-size ones when the filter asks for
    /// small assets.
    pub async fn list_candidates(
        &self,
        taxon_code: &str,
        kind: MediaKind,
        filter: FilterVariant,
    ) -> Result<Vec<AssetCandidate>, MediaError> {
        let url = self.listing_url(taxon_code, kind, filter)?;
        tracing::debug!(taxon = taxon_code, %kind, filter = filter.to_int(), "querying catalog");

        let listing: CatalogResponse = retry::get_ok(self.client.as_ref(), &url, &self.retry)
            .await?
            .json()
            .await?;

        let small = filter.is_small();
        let candidates: Vec<AssetCandidate> = listing
            .results
            .content
            .into_iter()
            .filter_map(|item| if small { item.preview_url } else { item.media_url })
            .map(|url| AssetCandidate { url, kind })
            .collect();
        tracing::info!(
            taxon = taxon_code,
            %kind,
            count = candidates.len(),
            "catalog returned candidates"
        );
        Ok(candidates)
    }
}
