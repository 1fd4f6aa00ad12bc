use std::path::PathBuf;

use birdmedia::pipeline::{Endpoints, PipelineConfig};
use birdmedia::retry::RetryConfig;

use crate::cli::GlobalArgs;

/// Settings resolved from the command line.
#[derive(Debug, Clone)]
pub struct Config {
    pub cache_dir: PathBuf,
    pub endpoints: Endpoints,
    pub concurrency: usize,
    pub result_count: u32,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Config {
    pub fn from_cli(args: &GlobalArgs) -> anyhow::Result<Self> {
        if args.concurrency == 0 {
            anyhow::bail!("--concurrency must be at least 1");
        }
        if args.count == 0 {
            anyhow::bail!("--count must be at least 1");
        }

        let defaults = Endpoints::default();
        let endpoints = Endpoints {
            taxon_search_url: args
                .taxon_url
                .clone()
                .unwrap_or(defaults.taxon_search_url),
            catalog_url: args.catalog_url.clone().unwrap_or(defaults.catalog_url),
            taxonomy_url: args.taxonomy_url.clone().unwrap_or(defaults.taxonomy_url),
        };

        Ok(Self {
            cache_dir: expand_tilde(&args.cache_dir),
            endpoints,
            concurrency: args.concurrency,
            result_count: args.count,
            max_retries: args.max_retries,
            retry_delay_secs: args.retry_delay,
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let retry_defaults = RetryConfig::default();
        PipelineConfig {
            cache_dir: self.cache_dir.clone(),
            endpoints: self.endpoints.clone(),
            concurrency: self.concurrency,
            result_count: self.result_count,
            retry: RetryConfig {
                max_retries: self.max_retries,
                base_delay_secs: self.retry_delay_secs,
                max_delay_secs: retry_defaults.max_delay_secs.max(self.retry_delay_secs),
            },
            ..PipelineConfig::default()
        }
    }
}
