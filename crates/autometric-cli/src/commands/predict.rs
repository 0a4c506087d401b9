//! Single prediction and model check commands

use anyhow::{Context, Result};
use autometric_core::{PriceQuote, PricePredictor, PredictorOptions, RawParams, ServiceConfig};
use chrono::NaiveDate;

use super::{open_predictor, today_or};

/// Price one car from `key=value` parameters
pub fn quote_params(
    predictor: &PricePredictor,
    params: Vec<(String, String)>,
    today: NaiveDate,
) -> Result<PriceQuote> {
    let params: RawParams = params.into_iter().collect();
    let quote = predictor
        .quote(&params, today)
        .context("Prediction failed")?;
    Ok(quote)
}

pub fn cmd_predict(
    config: &ServiceConfig,
    params: Vec<(String, String)>,
    today: Option<NaiveDate>,
    no_explain: bool,
) -> Result<()> {
    let mut predictor = open_predictor(config)?;
    if no_explain {
        let options = PredictorOptions {
            explain: false,
            ..predictor.options()
        };
        predictor = predictor.with_options(options);
    }

    let quote = quote_params(&predictor, params, today_or(today))?;
    println!("{}", serde_json::to_string_pretty(&quote)?);
    Ok(())
}

pub fn cmd_check(config: &ServiceConfig) -> Result<()> {
    let predictor = open_predictor(config)?;
    let schema = predictor.schema();

    println!();
    println!("🔎 AutoMetric Model Check");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Model:       {}", config.model_path.display());
    println!("   Schema:      {}", config.schema_path.display());
    println!("   Version:     {}", schema.model_version());
    println!(
        "   Features:    {} ({} categorical)",
        schema.len(),
        schema.categorical_feature_indices().len()
    );
    println!("   Multiplier:  x{}", schema.price_multiplier());
    println!("   Currency:    {}", schema.currency());
    println!("   Required:    {}", schema.required_parameters().join(", "));
    if let Some(fp) = predictor.fingerprint() {
        println!("   SHA-256:     {}", fp);
    }
    println!();
    println!("   ✅ Model and schema are consistent");
    Ok(())
}
