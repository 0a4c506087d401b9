//! Batch scoring command

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use autometric_core::{score_csv, BatchSummary, ServiceConfig};
use chrono::NaiveDate;
use tempfile::NamedTempFile;
use tracing::info;

use super::{open_predictor, today_or};

pub fn cmd_batch(
    config: &ServiceConfig,
    input: &Path,
    output: &Path,
    today: Option<NaiveDate>,
) -> Result<()> {
    let predictor = open_predictor(config)?;
    let summary = score_file(&predictor, input, output, today_or(today))?;

    println!("📄 Scored {} listings from {}", summary.rows, input.display());
    println!("   Priced: {}", summary.priced);
    if summary.failed > 0 {
        println!("   ⚠️  Failed: {} (see the error column)", summary.failed);
    }
    println!("   Output: {}", output.display());
    Ok(())
}

/// Score `input` into `output`
///
/// Rows are written to a temp file next to `output`, which only replaces
/// `output` once every row has been scored. A failed batch leaves no output.
pub fn score_file(
    predictor: &autometric_core::PricePredictor,
    input: &Path,
    output: &Path,
    today: NaiveDate,
) -> Result<BatchSummary> {
    let reader =
        File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;

    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;

    info!(input = %input.display(), "Scoring listings");
    let summary = score_csv(predictor, reader, BufWriter::new(staged.as_file()), today)
        .with_context(|| format!("Failed to score {}", input.display()))?;

    staged
        .persist(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(summary)
}
