//! Field agronomy engine CLI
//!
//! Runs the physics calculators, the full decision engine over recorded
//! telemetry, and model lifecycle tasks from the command line.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{analyze, models, physics};
use std::path::PathBuf;

/// Field agronomy engine CLI
#[derive(Parser)]
#[command(name = "agro")]
#[command(author, version, about = "CLI for the Field Agronomy Decision Engine", long_about = None)]
pub struct Cli {
    /// Model artifact directory (overrides the config file)
    #[arg(long, env = "AGRO_MODEL_DIR", global = true)]
    pub model_dir: Option<PathBuf>,

    /// Training dataset CSV (overrides the config file)
    #[arg(long, env = "AGRO_DATASET_PATH", global = true)]
    pub dataset: Option<PathBuf>,

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
    /// Reference evapotranspiration, wind safety and water demand
    Et0 {
        /// Air temperature in °C
        #[arg(long, allow_negative_numbers = true)]
        temperature: f64,

        /// Relative humidity in percent
        #[arg(long)]
        humidity: f64,

        /// Wind speed in km/h
        #[arg(long, default_value_t = agronomy_lib::DEFAULT_WIND_SPEED_KMH)]
        wind: f64,

        /// Station elevation in metres
        #[arg(long, default_value_t = 0.0)]
        elevation: f64,

        /// Crop for the crop coefficient
        #[arg(long)]
        crop: Option<String>,

        /// Growth stage (initial, mid_season, late_season)
        #[arg(long)]
        stage: Option<String>,
    },

    /// Nutrient lockout, corrective action and salinity stress
    Soil {
        #[arg(long)]
        ph: f64,

        /// Soil EC in dS/m
        #[arg(long)]
        ec: f64,

        /// Soil moisture in percent
        #[arg(long)]
        moisture: f64,

        /// Air temperature in °C for the stress index
        #[arg(long, default_value_t = 22.0, allow_negative_numbers = true)]
        temperature: f64,

        #[arg(long)]
        crop: Option<String>,
    },

    /// Run the decision engine over a JSON-lines telemetry file
    Analyze {
        /// Input file, one telemetry or pump record per line
        file: PathBuf,

        #[arg(long)]
        crop: Option<String>,

        #[arg(long)]
        stage: Option<String>,

        /// Farm identifier attached to results
        #[arg(long, default_value = "cli")]
        farm_id: String,

        /// Analyze with physics and rules only
        #[arg(long)]
        no_models: bool,
    },

    /// Model lifecycle
    #[command(subcommand)]
    Models(ModelsCommands),
}

#[derive(Subcommand)]
pub enum ModelsCommands {
    /// Generate synthetic data and fit a bootstrapped bundle
    Bootstrap {
        /// Replace existing models and dataset
        #[arg(long)]
        force: bool,

        /// Synthetic rows to generate
        #[arg(long, default_value_t = agronomy_lib::learning::DEFAULT_BOOTSTRAP_ROWS)]
        rows: usize,

        /// Seed for reproducible data
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Refit the models on the current dataset
    Train,

    /// Show the active model bundle and dataset
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
            .with_writer(std::io::stderr)
            .init();
    }

    let settings = config::Config::load()?.resolve(cli.model_dir.clone(), cli.dataset.clone());

    match cli.command {
        Commands::Et0 {
            temperature,
            humidity,
            wind,
            elevation,
            crop,
            stage,
        } => {
            let crop = crop.or_else(|| settings.crop.clone());
            let stage = stage.or_else(|| settings.growth_stage.clone());
            physics::show_et0(temperature, humidity, wind, elevation, crop, stage, cli.format)?;
        }
        Commands::Soil {
            ph,
            ec,
            moisture,
            temperature,
            crop,
        } => {
            let crop = crop.or_else(|| settings.crop.clone());
            physics::show_soil(ph, ec, moisture, temperature, crop, cli.format)?;
        }
        Commands::Analyze {
            file,
            crop,
            stage,
            farm_id,
            no_models,
        } => {
            let options = analyze::AnalyzeOptions {
                crop: crop.or_else(|| settings.crop.clone()),
                stage: stage.or_else(|| settings.growth_stage.clone()),
                farm_id,
                use_models: !no_models,
            };
            analyze::run(&file, &settings, options, cli.format)?;
        }
        Commands::Models(models_cmd) => match models_cmd {
            ModelsCommands::Bootstrap { force, rows, seed } => {
                models::bootstrap(&settings, force, rows, seed, cli.format)?;
            }
            ModelsCommands::Train => {
                models::train(&settings, cli.format)?;
            }
            ModelsCommands::Info => {
                models::info(&settings, cli.format)?;
            }
        },
    }

    Ok(())
}
