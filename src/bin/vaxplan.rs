//! Command-line entry point
//!
//! Usage:
//!   vaxplan [--config <FILE>] [--output-dir <DIR>] <forecast|allocate|run>
//!
//! Logging follows `RUST_LOG`, `info` by default.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vaxplan::{pipeline, PlanConfig};

/// Vaccine demand forecasting and pharmacy replenishment planning
#[derive(Parser, Debug)]
#[command(name = "vaxplan")]
#[command(about = "Forecast regional vaccine demand and plan pharmacy replenishment")]
struct Args {
    /// TOML configuration file (built-in defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured output directory
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Forecast demand and write forecast, metrics and out-of-fold tables
    Forecast,
    /// Allocate an existing forecast table to pharmacies and simulate stock
    Allocate,
    /// Forecast, allocate and write the run summary
    Run,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PlanConfig::from_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => PlanConfig::default(),
    };
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }

    match args.command {
        Command::Forecast => {
            let run = pipeline::forecast(&config).context("forecast failed")?;
            info!(
                rows = run.table.len(),
                fitted = run.model.models.len(),
                skipped = run.model.skipped.len(),
                "forecast done"
            );
        }
        Command::Allocate => {
            let plan = pipeline::allocate_from_files(&config).context("allocation failed")?;
            info!(
                allocations = plan.allocations.len(),
                snapshots = plan.stock.len(),
                replenishment = plan.replenishment.len(),
                "allocation done"
            );
        }
        Command::Run => {
            let summary = pipeline::run(&config).context("run failed")?;
            info!(
                forecast_rows = summary.forecast_rows,
                allocation_rows = summary.allocation_rows,
                replenishment_rows = summary.replenishment_rows,
                mean_smape = ?summary.ensemble_accuracy.mean_smape,
                "run done"
            );
        }
    }
    Ok(())
}
