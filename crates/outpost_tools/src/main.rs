//! Outpost - Development Tools

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use outpost_tools::scenario::Scenario;
use outpost_tools::{simulate, validate};

#[derive(Parser)]
#[command(name = "outpost-tools")]
#[command(about = "Development tools for the Outpost building engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a catalog file, or every catalog in a directory
    Validate {
        /// Catalog file or directory
        #[arg(default_value = "data/catalogs")]
        path: PathBuf,
    },
    /// Replay a scenario headlessly and print the outcome
    Simulate {
        /// Scenario file
        scenario: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Validate { path } => run_validate(&path),
        Commands::Simulate { scenario, json } => run_simulate(&scenario, json),
    };
    if let Err(e) = outcome {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn run_validate(path: &std::path::Path) -> outpost_tools::error::Result<()> {
    tracing::info!("Validating catalogs in: {}", path.display());
    if path.is_dir() {
        let checked = validate::validate_data_directory(path)?;
        tracing::info!(files = checked, "Validation passed");
    } else {
        let report = validate::validate_catalog_file(path)?;
        tracing::info!(definitions = report.definitions, "Validation passed");
        for (category, count) in &report.by_category {
            println!("{category}: {count}");
        }
    }
    Ok(())
}

fn run_simulate(path: &std::path::Path, json: bool) -> outpost_tools::error::Result<()> {
    let scenario = Scenario::load(path)?;
    let report = simulate::run_scenario(&scenario)?;
    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{report}");
    }
    Ok(())
}
