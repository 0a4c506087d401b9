//! Batch scoring of listing records
//!
//! Scraped listings are exchanged as CSV with one listing per row. Header
//! names are raw parameter keys (`brand`, `yom`, `mileage`, ...) or anything
//! that resolves to one (`Location` -> `town`, `Millage(KM)` -> `mileage`).
//! Each row is priced independently; rows with bad input get an `error`
//! value instead of aborting the batch.

use std::io::{Read, Write};

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Writer};
use tracing::{debug, warn};

use crate::error::Result;
use crate::features::RawParams;
use crate::predict::PricePredictor;
use crate::schema::FeatureSource;

/// Totals for a finished batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub rows: usize,
    pub priced: usize,
    pub failed: usize,
}

/// Map a CSV header to the raw parameter key it carries
fn parameter_key(header: &str) -> String {
    let trimmed = header.trim();
    if let Ok(source) = trimmed.parse::<FeatureSource>() {
        return source.key().to_string();
    }
    match FeatureSource::resolve(trimmed) {
        Some(source) if !source.is_derived() => source.key().to_string(),
        _ => trimmed.to_string(),
    }
}

fn record_to_params(keys: &[String], record: &StringRecord) -> RawParams {
    keys.iter()
        .zip(record.iter())
        .map(|(k, v)| (k.clone(), v.to_string()))
        .collect()
}

/// Price every row of `reader`, writing the input columns plus
/// `predicted_price`, `price` and `error` to `writer`
///
/// An internal error stops the batch; rows already written stay in `writer`.
pub fn score_csv<R: Read, W: Write>(
    predictor: &PricePredictor,
    reader: R,
    writer: W,
    today: NaiveDate,
) -> Result<BatchSummary> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let keys: Vec<String> = headers.iter().map(parameter_key).collect();

    let mut wtr = Writer::from_writer(writer);
    let mut out_headers = headers.clone();
    out_headers.push_field("predicted_price");
    out_headers.push_field("price");
    out_headers.push_field("error");
    wtr.write_record(&out_headers)?;

    let mut summary = BatchSummary::default();
    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        summary.rows += 1;

        let params = record_to_params(&keys, &record);
        let outcome = predictor
            .build_features(&params, today)
            .and_then(|row| predictor.predict_row(&row));

        let mut out = record.clone();
        match outcome {
            Ok(prediction) => {
                summary.priced += 1;
                out.push_field(&format!("{:.2}", prediction.predicted_price));
                out.push_field(&prediction.price.to_string());
                out.push_field("");
            }
            Err(e) if e.is_client_error() => {
                summary.failed += 1;
                debug!(row = line + 1, error = %e, "Skipping listing");
                out.push_field("");
                out.push_field("");
                out.push_field(&e.to_string());
            }
            Err(e) => return Err(e),
        }
        wtr.write_record(&out)?;
    }
    wtr.flush()?;

    if summary.failed > 0 {
        warn!(
            failed = summary.failed,
            rows = summary.rows,
            "Some listings could not be priced"
        );
    }
    Ok(summary)
}
