//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// AutoMetric - Used-car price prediction API
#[derive(Parser)]
#[command(name = "autometric")]
#[command(about = "Used-car price prediction with explanations", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to ~/.config/autometric/config.toml, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Model file (overrides config)
    #[arg(long, global = true)]
    pub model: Option<PathBuf>,

    /// Schema file (overrides config)
    #[arg(long, global = true)]
    pub schema: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server
    Serve {
        /// Port to listen on (config default: 5000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (config default: 0.0.0.0)
        #[arg(long)]
        host: Option<String>,
    },

    /// Price a single car and print the response as JSON
    Predict {
        /// Request parameter as key=value (e.g., --param brand=Toyota)
        #[arg(short = 'P', long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,

        /// Listing date used when no `date` parameter is given (YYYY-MM-DD, default: today)
        #[arg(long)]
        today: Option<NaiveDate>,

        /// Omit the explainability block
        #[arg(long)]
        no_explain: bool,
    },

    /// Load the model and schema and print a summary
    Check,

    /// Price every listing in a CSV file
    Batch {
        /// Listing CSV to score
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the scored CSV
        #[arg(short, long)]
        output: PathBuf,

        /// Listing date used for rows without a `date` column (YYYY-MM-DD, default: today)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

/// Parse a `key=value` pair
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=value: no `=` found in `{}`", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid KEY=value: empty key in `{}`", s));
    }
    Ok((key.to_string(), value.to_string()))
}
