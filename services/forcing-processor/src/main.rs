//! `forcing-processor`: a single batch CLI that turns a list of NWM
//! forcing grid files into per-catchment forcing output.
//!
//! No subcommands — this mirrors a single-purpose batch tool, not a
//! long-running service.

mod config;
mod metadata;
mod milestones;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crosswalk::CrosswalkLoader;
use forcing_pipeline::driver;
use milestones::MilestoneLog;
use nwm_store::ObjectStoreAdapter;

#[derive(Parser, Debug)]
#[command(name = "forcing-processor")]
#[command(about = "Project NWM gridded forcing onto catchments and write per-catchment time series")]
struct Args {
    /// Path to a YAML/JSON config file, or a literal JSON config blob.
    config: String,

    /// Log level.
    #[arg(long, default_value = "info", env = "FORCING_PROCESSOR_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let (config, ctx) = config::load(&args.config)?;
    let mut milestones = MilestoneLog::new(ctx.verbose);
    milestones.mark("CONFIGURATION_START");
    info!(nprocs = ctx.nprocs, nfile_chunk = ctx.nfile_chunk, "configuration loaded");
    milestones.mark("CONFIGURATION_END");

    let store = ObjectStoreAdapter::new();

    milestones.mark("READWEIGHTS_START");
    let loader = CrosswalkLoader::new();
    let (crosswalk, groups) = loader.load(&config.forcing.weight_file).await?;
    info!(catchments = crosswalk.len(), groups = groups.len(), "crosswalk loaded");
    milestones.mark("READWEIGHTS_END");

    let files = read_file_list(&store, &config.forcing.nwm_file).await?;
    info!(files = files.len(), "input file list loaded");

    let crosswalk = Arc::new(crosswalk);
    milestones.mark("PROCESSING_START");
    driver::run(&ctx, &files, Arc::clone(&crosswalk), &groups, &store).await?;
    milestones.mark("PROCESSING_END");

    if ctx.collect_stats {
        milestones.mark("METADATA_START");
        let representative = crosswalk.catchments().first().map(|s| s.as_str());
        let summary = metadata::collect(&store, &ctx, &files, representative).await?;
        metadata::write(&store, &ctx, &config, &summary).await?;
        milestones.mark("METADATA_END");
    }

    milestones.flush(&store, &ctx.output_path).await?;

    info!("forcing-processor run complete");
    Ok(())
}

fn init_logging(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Read `nwm_file`: plain text, one URI per line, trimmed.
async fn read_file_list(store: &ObjectStoreAdapter, nwm_file: &str) -> Result<Vec<String>> {
    let bytes = store.get(nwm_file).await?;
    let text = String::from_utf8(bytes.to_vec())?;
    Ok(text
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect())
}
