//! Bike demand CLI
//!
//! Trains the demand model, inspects the artifact directory and scores
//! single observations without starting the server.

mod commands;
mod output;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use commands::{predict, status, train};
use demand_lib::model::ModelParams;
use demand_lib::models::RawObservation;
use demand_lib::training::{default_split_date, TrainingConfig};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Hourly bike rental demand forecasting CLI
#[derive(Parser)]
#[command(name = "bikedemand")]
#[command(author, version, about = "CLI for the bike rental demand model", long_about = None)]
pub struct Cli {
    /// Directory holding the model artifacts
    #[arg(long, env = "BIKEDEMAND_ARTIFACTS_DIR", default_value = "artifacts", global = true)]
    pub artifacts_dir: PathBuf,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train the model and regenerate all artifacts
    Train(TrainArgs),

    /// Show which artifacts exist and whether they load
    Status,

    /// Predict demand for one hour of conditions
    Predict(PredictArgs),
}

#[derive(Args)]
pub struct TrainArgs {
    /// Canonical hourly dataset (CSV)
    #[arg(long, env = "BIKEDEMAND_DATASET_PATH", default_value = "data/bike_sharing.csv")]
    pub dataset: PathBuf,

    /// First day of the held-out partition (YYYY-MM-DD)
    #[arg(long, default_value_t = default_split_date())]
    pub split_date: NaiveDate,

    /// Number of boosting rounds
    #[arg(long, default_value_t = ModelParams::default().n_estimators)]
    pub n_estimators: usize,

    /// Maximum depth of each tree
    #[arg(long, default_value_t = ModelParams::default().max_depth)]
    pub max_depth: usize,

    /// Shrinkage applied to every tree
    #[arg(long, default_value_t = ModelParams::default().learning_rate)]
    pub learning_rate: f64,
}

#[derive(Args)]
pub struct PredictArgs {
    /// Season code (1-4)
    #[arg(long)]
    pub season: f64,

    /// Year flag (0 = 2011, 1 = 2012)
    #[arg(long, default_value_t = 1.0)]
    pub yr: f64,

    /// Month (1-12)
    #[arg(long)]
    pub mnth: f64,

    /// Hour of day (0-23)
    #[arg(long)]
    pub hr: f64,

    /// Public holiday flag
    #[arg(long)]
    pub holiday: f64,

    /// Day of week (0 = Sunday)
    #[arg(long)]
    pub weekday: f64,

    /// Working day flag
    #[arg(long)]
    pub workingday: f64,

    /// Weather situation code (1-4)
    #[arg(long)]
    pub weathersit: f64,

    /// Normalized temperature
    #[arg(long)]
    pub temp: f64,

    /// Normalized humidity
    #[arg(long)]
    pub hum: f64,

    /// Normalized wind speed
    #[arg(long)]
    pub windspeed: f64,

    /// Observed rentals to compare against
    #[arg(long)]
    pub actual: Option<f64>,
}

impl PredictArgs {
    fn observation(&self) -> RawObservation {
        RawObservation {
            season: self.season,
            yr: self.yr,
            mnth: self.mnth,
            hr: self.hr,
            holiday: self.holiday,
            weekday: self.weekday,
            workingday: self.workingday,
            weathersit: self.weathersit,
            temp: self.temp,
            hum: self.hum,
            windspeed: self.windspeed,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Train(args) => {
            let config = TrainingConfig {
                dataset_path: args.dataset.clone(),
                artifacts_dir: cli.artifacts_dir.clone(),
                split_date: args.split_date,
                model: ModelParams {
                    n_estimators: args.n_estimators,
                    max_depth: args.max_depth,
                    learning_rate: args.learning_rate,
                    ..Default::default()
                },
            };
            train::run_training(config, cli.format)
        }
        Commands::Status => status::show_status(&cli.artifacts_dir, cli.format),
        Commands::Predict(args) => {
            predict::predict_one(&cli.artifacts_dir, args.observation(), args.actual, cli.format)
        }
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}
