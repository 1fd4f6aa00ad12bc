//! birdmedia command-line driver.
//!
//! Fetches, validates and precaches species media through the library
//! pipeline, and runs cache rotation once or on an interval.

#![warn(clippy::all)]

mod cli;
mod config;
mod shutdown;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use birdmedia::cache::evict::run_rotation_daemon;
use birdmedia::pipeline::PrecacheOutcome;
use birdmedia::{postprocess, FilterVariant, MediaKind, MediaPipeline};
use cli::Command;

async fn run_fetch(pipeline: &MediaPipeline, args: cli::FetchArgs) -> anyhow::Result<()> {
    let filter = FilterVariant::from_int(args.filter);
    let selected = pipeline
        .fetch(&args.name, args.kind, filter, args.previous)
        .await?;

    println!("Species: {}", selected.species);
    println!("Path:    {}", selected.path.display());
    println!("Cursor:  {}", selected.index);

    if args.bw || filter.is_black_and_white() {
        if args.kind != MediaKind::Images {
            tracing::warn!("Black-and-white rendering only applies to images, skipping");
            return Ok(());
        }
        let output = args
            .output
            .unwrap_or_else(|| PathBuf::from(format!("{}-bw.png", selected.index)));
        let bytes = postprocess::black_and_white(&selected.path).await?;
        tokio::fs::write(&output, bytes).await?;
        println!("B&W:     {}", output.display());
    }
    Ok(())
}

async fn run_validate(pipeline: &MediaPipeline, args: cli::ValidateArgs) -> anyhow::Result<()> {
    let mut invalid = 0usize;
    for name in &args.names {
        let check = pipeline.validate_species(name).await?;
        let verdict = if check.valid { "valid" } else { "invalid" };
        if check.detected_name.is_empty() {
            println!("{}: {} ({})", check.input, verdict, check.reason);
        } else {
            println!(
                "{}: {} ({}), detected as {}",
                check.input, verdict, check.reason, check.detected_name
            );
        }
        if !check.valid {
            invalid += 1;
        }
    }
    if invalid > 0 {
        anyhow::bail!("{} of {} species are invalid", invalid, args.names.len());
    }
    Ok(())
}

async fn read_species_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path.display(), e))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

async fn run_precache(pipeline: &MediaPipeline, args: cli::PrecacheArgs) -> anyhow::Result<()> {
    let mut names = match &args.species_file {
        Some(path) => read_species_file(path).await?,
        None => Vec::new(),
    };
    names.extend(args.names);
    if names.is_empty() {
        anyhow::bail!("No species given: pass names or --species-file");
    }

    let filter = FilterVariant::from_int(args.filter);
    let outcomes = pipeline.precache(&names, args.kind, filter).await;

    for outcome in &outcomes {
        match &outcome.result {
            Ok(count) => println!("{}: {} {}", outcome.species, count, args.kind),
            Err(e) => println!("{}: failed: {}", outcome.input, e),
        }
    }
    precache_summary(&outcomes)
}

fn precache_summary(outcomes: &[PrecacheOutcome]) -> anyhow::Result<()> {
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    tracing::info!(
        total = outcomes.len(),
        failed,
        "precache finished"
    );
    if failed > 0 {
        anyhow::bail!("{} of {} species failed", failed, outcomes.len());
    }
    Ok(())
}

async fn run_rotate(pipeline: &MediaPipeline, args: cli::RotateArgs) -> anyhow::Result<()> {
    let removed = pipeline.rotate().await;
    println!("Removed {} species directories", removed);

    if let Some(interval) = args.watch_with_interval {
        let shutdown_token = shutdown::install_signal_handler();
        run_rotation_daemon(
            pipeline.evictor().clone(),
            Duration::from_secs(interval),
            shutdown_token,
        )
        .await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.global.log_level.as_filter())),
        )
        .init();

    let config = config::Config::from_cli(&cli.global)?;
    tracing::info!(
        cache_dir = %config.cache_dir.display(),
        concurrency = config.concurrency,
        "Starting birdmedia"
    );

    let client = reqwest::Client::builder()
        .user_agent(concat!("birdmedia/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let pipeline = MediaPipeline::new(config.pipeline_config(), Arc::new(client));

    match cli.command {
        Command::Fetch(args) => run_fetch(&pipeline, args).await,
        Command::Validate(args) => run_validate(&pipeline, args).await,
        Command::Precache(args) => run_precache(&pipeline, args).await,
        Command::Rotate(args) => run_rotate(&pipeline, args).await,
    }
}
