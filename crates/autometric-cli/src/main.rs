//! AutoMetric CLI - Used-car price prediction
//!
//! Usage:
//!   autometric serve --port 5000              Start the price API
//!   autometric predict -P brand=Toyota ...    Price one car
//!   autometric check                          Validate model and schema
//!   autometric batch -i in.csv -o out.csv     Price a listing CSV

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(
        cli.config.as_deref(),
        cli.model.as_deref(),
        cli.schema.as_deref(),
    )?;

    match cli.command {
        Commands::Serve { port, host } => {
            commands::cmd_serve(config, host.as_deref(), port).await
        }
        Commands::Predict {
            params,
            today,
            no_explain,
        } => commands::cmd_predict(&config, params, today, no_explain),
        Commands::Check => commands::cmd_check(&config),
        Commands::Batch {
            input,
            output,
            today,
        } => commands::cmd_batch(&config, &input, &output, today),
    }
}
