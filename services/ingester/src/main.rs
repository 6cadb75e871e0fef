//! GDAS to GraphCast input preparation.
//!
//! Downloads the GDAS 0.25 degree files a cycle window needs, decodes the
//! GraphCast variables and writes one NetCDF dataset.

mod config;
mod download;
mod sources;

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use gdas_common::format_cycle;
use ingestion::Ingester;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::Args;
use download::{DownloadConfig, DownloadManager};
use sources::download_plan;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args)?;

    let window = args.window()?;
    let config = args.pipeline_config()?;

    info!(
        start = %format_cycle(&window.start),
        end = %format_cycle(&window.end),
        levels = %config.levels,
        method = %config.method,
        output_dir = %config.output_dir.display(),
        "Starting GDAS preparation"
    );

    let raw_root = config.raw_data_root();
    if args.skip_download {
        info!(raw_root = %raw_root.display(), "Skipping download");
    } else {
        let plan = download_plan(&window, config.levels, args.source, &raw_root);
        info!(files = plan.len(), source = ?args.source, "Downloading raw files");

        let manager = DownloadManager::new(DownloadConfig {
            max_retries: args.max_retries,
            max_concurrent: args.max_concurrent.max(1),
            ..DownloadConfig::default()
        })?;
        let summary = manager.download_all(&plan).await?;
        info!(
            downloaded = summary.downloaded,
            skipped = summary.skipped,
            bytes = summary.bytes,
            "Raw files ready"
        );
    }

    let ingester = Ingester::new(config);
    let started = Instant::now();
    let result = tokio::task::spawn_blocking(move || ingester.run(&window))
        .await
        .context("Ingestion task panicked")??;

    info!(
        output = %result.output_path.display(),
        cycles = result.cycles.len(),
        steps = result.steps,
        variables = result.variables.len(),
        intermediates_removed = result.intermediates_removed,
        raw_data_removed = result.raw_data_removed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Dataset written"
    );

    Ok(())
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    if args.log_json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}
