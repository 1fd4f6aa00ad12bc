//! Species name resolution: common or alternate names to catalog taxon
//! codes and scientific names.
//!
//! Results are memoized per input name for the life of the resolver. Taxon
//! data is small and stable, so entries never expire; [`NameResolver::forget`]
//! and [`NameResolver::clear`] exist for the rare case where it changes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use reqwest::Url;
use serde::Deserialize;

use crate::error::MediaError;
use crate::http::HttpClient;
use crate::retry::{self, RetryConfig};

/// Labels within this many unmatched characters count as the same name.
const SPELLING_CUTOFF: usize = 4;

/// A catalog taxon: its code and the catalog's display label, usually
/// `"Common Name - Scientific name"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaxonRecord {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaxonomyEntry {
    sci_name: String,
}

pub struct NameResolver {
    client: Arc<dyn HttpClient>,
    taxon_search_url: String,
    taxonomy_url: String,
    retry: RetryConfig,
    taxa: Mutex<HashMap<String, TaxonRecord>>,
    scientific: Mutex<HashMap<String, String>>,
}

impl std::fmt::Debug for NameResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameResolver")
            .field("taxon_search_url", &self.taxon_search_url)
            .field("taxonomy_url", &self.taxonomy_url)
            .finish_non_exhaustive()
    }
}

impl NameResolver {
    pub fn new(
        client: Arc<dyn HttpClient>,
        taxon_search_url: impl Into<String>,
        taxonomy_url: impl Into<String>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            client,
            taxon_search_url: taxon_search_url.into(),
            taxonomy_url: taxonomy_url.into(),
            retry,
            taxa: Mutex::new(HashMap::new()),
            scientific: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `name` to its catalog taxon.
    ///
    /// When the search returns several candidates, the first whose common or
    /// scientific label is spelled close to `name` wins; otherwise the
    /// catalog's top result is kept.
    pub async fn resolve(&self, name: &str) -> Result<TaxonRecord, MediaError> {
        let memo = self
            .taxa
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned();
        if let Some(hit) = memo {
            tracing::debug!(species = %name, "taxon found in memo");
            return Ok(hit);
        }

        let url = search_url(&self.taxon_search_url, name)?;
        tracing::debug!(species = %name, %url, "looking up taxon code");
        let hits: Vec<TaxonRecord> = retry::get_ok(self.client.as_ref(), &url, &self.retry)
            .await?
            .json()
            .await?;

        let record = choose_taxon(&hits, name)
            .cloned()
            .ok_or_else(|| MediaError::NotFound {
                name: name.to_string(),
            })?;
        tracing::info!(species = %name, code = %record.code, label = %record.name, "resolved taxon");

        self.taxa
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), record.clone());
        Ok(record)
    }

    /// Resolve `name` to a canonical scientific name.
    ///
    /// If no taxon code exists for `name`, the name itself is tried as a code
    /// against the taxonomy endpoint.
    pub async fn scientific_name(&self, name: &str) -> Result<String, MediaError> {
        let memo = self
            .scientific
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned();
        if let Some(hit) = memo {
            return Ok(hit);
        }

        let code = match self.resolve(name).await {
            Ok(record) => record.code,
            Err(MediaError::NotFound { .. }) => name.to_string(),
            Err(e) => return Err(e),
        };

        let url = taxonomy_url(&self.taxonomy_url, &code)?;
        let entries: Vec<TaxonomyEntry> = retry::get_ok(self.client.as_ref(), &url, &self.retry)
            .await?
            .json()
            .await?;
        let sci_name = entries
            .into_iter()
            .next()
            .map(|e| e.sci_name)
            .ok_or_else(|| MediaError::NotFound {
                name: name.to_string(),
            })?;
        tracing::info!(species = %name, sci_name = %sci_name, "resolved scientific name");

        self.scientific
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), sci_name.clone());
        Ok(sci_name)
    }

    /// Drop memoized results for one name.
    pub fn forget(&self, name: &str) {
        self.taxa.lock().unwrap_or_else(|e| e.into_inner()).remove(name);
        self.scientific
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
    }

    pub fn clear(&self) {
        self.taxa.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.scientific
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// Build the taxonomy lookup URL for a taxon `code`.
pub fn taxonomy_url(base: &str, code: &str) -> Result<String, MediaError> {
    Url::parse_with_params(base, &[("fmt", "json"), ("species", code)])
        .map(String::from)
        .map_err(|e| MediaError::invalid_url(base, e))
}

/// Build the taxon search URL for `name`.
pub fn search_url(base: &str, name: &str) -> Result<String, MediaError> {
    let query = normalize_query(name);
    Url::parse_with_params(base, &[("q", query.as_str())])
        .map(String::from)
        .map_err(|e| MediaError::invalid_url(base, e))
}

/// Hyphens become spaces and possessives are dropped; the search endpoint
/// does not match either.
pub fn normalize_query(name: &str) -> String {
    name.replace('-', " ").replace("'s", "")
}

fn choose_taxon<'a>(hits: &'a [TaxonRecord], name: &str) -> Option<&'a TaxonRecord> {
    let first = hits.first()?;
    if hits.len() == 1 {
        return Some(first);
    }
    let close = hits.iter().find(|hit| {
        let mut labels = hit.name.split(" - ");
        let common = labels.next().unwrap_or_default();
        let scientific = labels.next();
        spellcheck(common, name, SPELLING_CUTOFF)
            || scientific.is_some_and(|s| spellcheck(s, name, SPELLING_CUTOFF))
    });
    Some(close.unwrap_or(first))
}

fn normalize_word(word: &str) -> Vec<char> {
    word.to_lowercase()
        .replace('-', " ")
        .replace('\'', "")
        .chars()
        .collect()
}

/// Whether two names differ by fewer than `cutoff` characters.
///
/// The difference is the longer name's length minus the longest common
/// subsequence: each substitution, insertion or deletion costs one.
pub fn spellcheck(a: &str, b: &str, cutoff: usize) -> bool {
    let a = normalize_word(a);
    let b = normalize_word(b);
    if a == b {
        return true;
    }
    let longer = a.len().max(b.len());
    longer - lcs_len(&a, &b) < cutoff
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                cur[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockHttp;
    use serde_json::json;

    const SEARCH: &str = "http://catalog.test/taxon";
    const TAXONOMY: &str = "http://taxonomy.test/ebird";

    fn resolver(http: Arc<MockHttp>) -> NameResolver {
        NameResolver::new(
            http,
            SEARCH,
            TAXONOMY,
            RetryConfig {
                max_retries: 3,
                base_delay_secs: 0,
                max_delay_secs: 0,
            },
        )
    }

    fn lookup_url(code: &str) -> String {
        taxonomy_url(TAXONOMY, code).unwrap()
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("Cooper's Hawk"), "Cooper Hawk");
        assert_eq!(normalize_query("Black-capped Chickadee"), "Black capped Chickadee");
    }

    #[test]
    fn test_spellcheck() {
        assert!(spellcheck("Northern Cardinal", "northern cardinal", 4));
        assert!(spellcheck("Northern Cardinal", "Northern Cardnal", 4));
        assert!(spellcheck("Black-capped Chickadee", "Black capped Chickadee", 4));
        assert!(!spellcheck("Northern Cardinal", "Northern Mockingbird", 4));
        // three substitutions: still within budget
        assert!(spellcheck("abcdef", "abcxyz", 4));
        // four: over budget
        assert!(!spellcheck("abcdefgh", "abcdwxyz", 4));
    }

    #[test]
    fn test_choose_taxon_prefers_close_label() {
        let hits = vec![
            TaxonRecord {
                code: "norcar".into(),
                name: "Northern Cardinal - Cardinalis cardinalis".into(),
            },
            TaxonRecord {
                code: "pyrrhu".into(),
                name: "Pyrrhuloxia - Cardinalis sinuatus".into(),
            },
        ];
        assert_eq!(choose_taxon(&hits, "Pyrrhuloxia").unwrap().code, "pyrrhu");
        assert_eq!(
            choose_taxon(&hits, "Cardinalis sinuatus").unwrap().code,
            "pyrrhu"
        );
        // nothing close: keep the catalog's top hit
        assert_eq!(choose_taxon(&hits, "Blue Jay").unwrap().code, "norcar");
        assert!(choose_taxon(&[], "Blue Jay").is_none());
    }

    #[test]
    fn test_choose_taxon_is_deterministic() {
        let hits = vec![
            TaxonRecord {
                code: "a".into(),
                name: "Blue Jay - Cyanocitta cristata".into(),
            },
            TaxonRecord {
                code: "b".into(),
                name: "Blue Jay - Cyanocitta cristata".into(),
            },
        ];
        for _ in 0..10 {
            assert_eq!(choose_taxon(&hits, "Blue Jay").unwrap().code, "a");
        }
    }

    #[tokio::test]
    async fn test_resolve_memoizes_by_name() {
        let http = Arc::new(MockHttp::new());
        let url = search_url(SEARCH, "Blue Jay").unwrap();
        http.json(
            &url,
            json!([{"code": "blujay", "name": "Blue Jay - Cyanocitta cristata"}]),
        );
        let r = resolver(http.clone());

        let first = r.resolve("Blue Jay").await.unwrap();
        let second = r.resolve("Blue Jay").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.code, "blujay");
        assert_eq!(http.hits(&url), 1);

        r.forget("Blue Jay");
        r.resolve("Blue Jay").await.unwrap();
        assert_eq!(http.hits(&url), 2);
    }

    #[tokio::test]
    async fn test_resolve_empty_result_is_not_found() {
        let http = Arc::new(MockHttp::new());
        http.json(&search_url(SEARCH, "Snark").unwrap(), json!([]));
        let err = resolver(http).resolve("Snark").await.unwrap_err();
        assert!(matches!(err, MediaError::NotFound { name } if name == "Snark"));
    }

    #[tokio::test]
    async fn test_resolve_upstream_error_after_retries() {
        let http = Arc::new(MockHttp::new());
        let url = search_url(SEARCH, "Blue Jay").unwrap();
        http.status(&url, 500);
        let err = resolver(http.clone()).resolve("Blue Jay").await.unwrap_err();
        assert!(matches!(err, MediaError::Upstream { status: 500, .. }));
        assert_eq!(http.hits(&url), 4);
    }

    #[tokio::test]
    async fn test_scientific_name() {
        let http = Arc::new(MockHttp::new());
        http.json(
            &search_url(SEARCH, "Blue Jay").unwrap(),
            json!([{"code": "blujay", "name": "Blue Jay - Cyanocitta cristata"}]),
        );
        http.json(&lookup_url("blujay"), json!([{"sciName": "Cyanocitta cristata"}]));
        let r = resolver(http.clone());
        assert_eq!(r.scientific_name("Blue Jay").await.unwrap(), "Cyanocitta cristata");
        assert_eq!(r.scientific_name("Blue Jay").await.unwrap(), "Cyanocitta cristata");
        assert_eq!(http.hits(&lookup_url("blujay")), 1);
    }

    #[tokio::test]
    async fn test_scientific_name_falls_back_to_raw_code() {
        let http = Arc::new(MockHttp::new());
        http.json(&search_url(SEARCH, "blujay").unwrap(), json!([]));
        http.json(&lookup_url("blujay"), json!([{"sciName": "Cyanocitta cristata"}]));
        let r = resolver(http);
        assert_eq!(r.scientific_name("blujay").await.unwrap(), "Cyanocitta cristata");
    }
}
