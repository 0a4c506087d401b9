//! CLI command implementations
//!
//! - `serve` - Web server command
//! - `predict` - Single prediction (predict) and model summary (check)
//! - `batch` - Listing CSV scoring

pub mod batch;
pub mod predict;
pub mod serve;

// Re-export command functions for main.rs
pub use batch::*;
pub use predict::*;
pub use serve::*;

use std::path::Path;

use anyhow::{Context, Result};
use autometric_core::{PricePredictor, PredictorOptions, ServiceConfig};

/// Resolve the service config and apply path overrides from the command line
pub fn load_config(
    config_path: Option<&Path>,
    model: Option<&Path>,
    schema: Option<&Path>,
) -> Result<ServiceConfig> {
    let mut config = ServiceConfig::load(config_path).context("Failed to load config")?;
    if let Some(path) = model {
        config.model_path = path.to_path_buf();
    }
    if let Some(path) = schema {
        config.schema_path = path.to_path_buf();
    }
    Ok(config)
}

/// Load the predictor described by `config`
pub fn open_predictor(config: &ServiceConfig) -> Result<PricePredictor> {
    let predictor = PricePredictor::from_files(&config.model_path, &config.schema_path)
        .with_context(|| {
            format!(
                "Failed to load model {} with schema {}",
                config.model_path.display(),
                config.schema_path.display()
            )
        })?;
    Ok(predictor.with_options(PredictorOptions {
        explain: config.explain_enabled,
        top_n: config.top_n,
    }))
}

/// Reference date for listings without a `date` value
pub fn today_or(date: Option<chrono::NaiveDate>) -> chrono::NaiveDate {
    date.unwrap_or_else(|| chrono::Utc::now().date_naive())
}
