use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use birdmedia::types::{LogLevel, MediaKind};

#[derive(Parser, Debug)]
#[command(
    name = "birdmedia",
    version,
    about = "Fetch and cache species images and songs from a media catalog"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Root directory of the media cache
    #[arg(long, global = true, env = "BIRDMEDIA_CACHE_DIR", default_value = "cache")]
    pub cache_dir: String,

    /// Log level (RUST_LOG takes precedence when set)
    #[arg(long, global = true, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Maximum asset downloads in flight for one species
    #[arg(long, global = true, default_value_t = 5)]
    pub concurrency: usize,

    /// Number of candidates requested from the catalog per query
    #[arg(long, global = true, default_value_t = 20)]
    pub count: u32,

    /// Retries for a failed catalog or taxon request
    #[arg(long, global = true, default_value_t = 3)]
    pub max_retries: u32,

    /// Base delay in seconds between retries (0 retries immediately)
    #[arg(long, global = true, default_value_t = 0)]
    pub retry_delay: u64,

    /// Override the taxon search endpoint
    #[arg(long, global = true)]
    pub taxon_url: Option<String>,

    /// Override the catalog listing endpoint
    #[arg(long, global = true)]
    pub catalog_url: Option<String>,

    /// Override the taxonomy (scientific name) endpoint
    #[arg(long, global = true)]
    pub taxonomy_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the next cached asset for a species, downloading on a miss
    Fetch(FetchArgs),

    /// Check whether species names have a taxon and enough images
    Validate(ValidateArgs),

    /// Populate the cache for a list of species
    Precache(PrecacheArgs),

    /// Delete a random tenth of the cached species directories
    Rotate(RotateArgs),
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Common or scientific species name
    pub name: String,

    /// Media kind to fetch
    #[arg(long, value_enum, default_value = "images")]
    pub kind: MediaKind,

    /// Filter variant as its integer encoding
    #[arg(long, default_value_t = 0)]
    pub filter: u32,

    /// Cursor returned by the previous fetch, to avoid a repeat
    #[arg(long)]
    pub previous: Option<usize>,

    /// Render the image in black and white
    #[arg(long)]
    pub bw: bool,

    /// Where to write the black-and-white rendering
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Species names to check
    #[arg(required = true)]
    pub names: Vec<String>,
}

#[derive(Args, Debug)]
pub struct PrecacheArgs {
    /// File with one species name per line
    #[arg(long)]
    pub species_file: Option<PathBuf>,

    /// Additional species names
    pub names: Vec<String>,

    /// Media kind to cache
    #[arg(long, value_enum, default_value = "images")]
    pub kind: MediaKind,

    /// Filter variant as its integer encoding
    #[arg(long, default_value_t = 0)]
    pub filter: u32,
}

#[derive(Args, Debug)]
pub struct RotateArgs {
    /// Keep running, rotating every N seconds until interrupted
    #[arg(long)]
    pub watch_with_interval: Option<u64>,
}
