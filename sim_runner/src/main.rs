//! sim_runner - Run a batch of trials for a fight file and print the summary as JSON

mod character;

use clap::Parser;
use sim_core::config::{load_fight_config, FightConfig};
use sim_core::run_batch;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Run a combat simulation batch")]
struct Args {
    /// Fight configuration (TOML). Defaults are used when omitted.
    fight: Option<PathBuf>,

    /// Override the number of trials
    #[arg(short, long)]
    iterations: Option<usize>,

    /// Override the base seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Pretty-print the JSON summary
    #[arg(long)]
    pretty: bool,
}

fn load(args: &Args) -> Result<FightConfig, sim_core::ConfigError> {
    let mut config = match &args.fight {
        Some(path) => load_fight_config(path)?,
        None => FightConfig::default(),
    };
    if let Some(iterations) = args.iterations {
        config.iterations = iterations;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match load(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("invalid fight configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(
        duration_secs = config.duration_secs,
        targets = config.num_targets,
        "fight loaded"
    );

    let result = match run_batch(&config, character::build) {
        Ok(result) => result,
        Err(e) => {
            error!("batch failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let json = if args.pretty {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string(&result)
    };
    match json {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("cannot serialise results: {}", e);
            ExitCode::FAILURE
        }
    }
}
