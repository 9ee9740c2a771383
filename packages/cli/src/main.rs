#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the coffee map grid survey.
//!
//! Each subcommand runs one pipeline stage against the artifacts named in
//! the config file; `run` chains collect, analyze and hotspots. Logging
//! and progress bars share the terminal through
//! [`coffee_map_cli_utils::init_logger`].

mod config;
mod pipeline;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use coffee_map_analytics_models::HotspotCriteria;

use crate::config::SurveyConfig;

#[derive(Parser)]
#[command(name = "coffee_map", about = "Coffee shop grid survey and tract opportunity scoring")]
struct Cli {
    /// Configuration file (defaults to `coffee_map.toml` if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the configured county's tract boundaries from `TIGERweb`
    Tracts,
    /// Survey the study area on a search grid and write the places CSV
    Collect,
    /// Join places onto tracts and demographics and write the region `GeoJSON`
    Analyze,
    /// Flag populous, affluent tracts with no coffee shops
    Hotspots {
        /// Population quantile a hotspot must reach (0..=1)
        #[arg(long, default_value = "0.75")]
        population_quantile: f64,
        /// Median income quantile a hotspot must reach (0..=1)
        #[arg(long, default_value = "0.75")]
        income_quantile: f64,
        /// Number of hotspots to print
        #[arg(long, default_value = "5")]
        top: usize,
    },
    /// Write demand model inputs for tracts with complete demographics
    Features,
    /// Merge predicted shop counts into opportunity scores
    Opportunity {
        /// CSV with `GEOID,Predicted` columns from an external model
        #[arg(long)]
        predictions: PathBuf,
        /// Number of scores to print
        #[arg(long, default_value = "10")]
        top: usize,
    },
    /// Run collect, analyze and hotspots in sequence
    Run {
        /// Number of hotspots to print
        #[arg(long, default_value = "5")]
        top: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = coffee_map_cli_utils::init_logger();
    let cli = Cli::parse();
    let config = SurveyConfig::load(cli.config.as_deref())?;
    let start = Instant::now();

    match cli.command {
        Commands::Tracts => {
            let count = pipeline::download_tracts(&config).await?;
            log::info!("Downloaded {count} tract boundaries");
        }
        Commands::Collect => {
            let stats = pipeline::collect(&config, &multi).await?;
            log::info!(
                "Collected {} observations over {} grid points ({} failed)",
                stats.observations,
                stats.points,
                stats.failed_points
            );
        }
        Commands::Analyze => pipeline::analyze(&config).await?,
        Commands::Hotspots {
            population_quantile,
            income_quantile,
            top,
        } => {
            let criteria = hotspot_criteria(population_quantile, income_quantile)?;
            pipeline::hotspots(&config, criteria, top)?;
        }
        Commands::Features => {
            let count = pipeline::features(&config)?;
            log::info!("Wrote {count} model input rows");
        }
        Commands::Opportunity { predictions, top } => {
            pipeline::opportunity(&config, &predictions, top)?;
        }
        Commands::Run { top } => {
            pipeline::run(&config, &multi, HotspotCriteria::default(), top).await?;
        }
    }

    log::info!("Done in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn hotspot_criteria(
    population_quantile: f64,
    income_quantile: f64,
) -> Result<HotspotCriteria, Box<dyn std::error::Error>> {
    for (name, q) in [
        ("population-quantile", population_quantile),
        ("income-quantile", income_quantile),
    ] {
        if !(0.0..=1.0).contains(&q) {
            return Err(format!("--{name} must be between 0 and 1, got {q}").into());
        }
    }

    Ok(HotspotCriteria {
        population_quantile,
        income_quantile,
    })
}
