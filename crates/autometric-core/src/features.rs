//! Feature builder
//!
//! Turns the flat string parameters of a price request into a single row
//! whose columns match the schema exactly: same names, same order, numeric
//! or categorical as declared. A misordered row produces a wrong price
//! without any error, so the schema is the only source of column order.

use std::collections::HashMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::error::{Error, Result};
use crate::schema::{FeatureSource, Schema};

/// Raw request parameters (query string, CLI `key=value` pairs, CSV row)
pub type RawParams = HashMap<String, String>;

/// Label used for amenity flags whose value is "true"
pub const AVAILABLE: &str = "Available";

/// Label used for every other amenity flag value
pub const NOT_AVAILABLE: &str = "Not Available";

/// A single model input value
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Numeric(f64),
    Categorical(String),
}

impl FeatureValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Numeric(v) => Some(*v),
            Self::Categorical(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Numeric(_) => None,
            Self::Categorical(s) => Some(s),
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "{}", format_number(*v)),
            Self::Categorical(s) => write!(f, "{}", s),
        }
    }
}

/// Render integral numbers without a decimal point, others with two decimals
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

/// One row of model input, ordered as the schema declares
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<FeatureValue>,
}

impl FeatureVector {
    pub fn new(values: Vec<FeatureValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FeatureValue> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[FeatureValue] {
        &self.values
    }
}

/// Normalize a boolean-like amenity flag to the label the model was trained on.
///
/// Only the case-insensitive string "true" is positive. Anything else,
/// including an absent flag, "1" and "yes", maps to the negative label.
pub fn normalize_flag(value: Option<&str>) -> &'static str {
    match value {
        Some(v) if v.eq_ignore_ascii_case("true") => AVAILABLE,
        Some(v) => {
            if !v.eq_ignore_ascii_case("false") {
                debug!(value = v, "Unrecognized flag value, using negative label");
            }
            NOT_AVAILABLE
        }
        None => NOT_AVAILABLE,
    }
}

/// Builds feature vectors for one schema
pub struct FeatureBuilder<'a> {
    schema: &'a Schema,
    /// Listing date used when the request carries no `date`
    reference_date: NaiveDate,
}

impl<'a> FeatureBuilder<'a> {
    pub fn new(schema: &'a Schema, reference_date: NaiveDate) -> Self {
        Self {
            schema,
            reference_date,
        }
    }

    /// Names of required parameters that are absent or blank, in check order
    pub fn missing_parameters(&self, params: &RawParams) -> Vec<String> {
        self.schema
            .required_parameters()
            .iter()
            .filter(|key| lookup(params, key).is_none())
            .cloned()
            .collect()
    }

    /// Build the feature row for a request
    pub fn build(&self, params: &RawParams) -> Result<FeatureVector> {
        let missing = self.missing_parameters(params);
        if !missing.is_empty() {
            return Err(Error::MissingParameters(missing));
        }

        let mut values = Vec::with_capacity(self.schema.len());
        for column in self.schema.columns() {
            let value = if column.source.is_numeric() {
                let number = self.number_for(column.source, params)?;
                if column.categorical {
                    FeatureValue::Categorical(format_number(number))
                } else {
                    FeatureValue::Numeric(number)
                }
            } else {
                FeatureValue::Categorical(self.text_for(column.source, params)?)
            };
            values.push(value);
        }

        Ok(FeatureVector::new(values))
    }

    fn number_for(&self, source: FeatureSource, params: &RawParams) -> Result<f64> {
        match source {
            FeatureSource::ListingYear => Ok(self.listing_date(params)?.year() as f64),
            FeatureSource::CarAge => self.car_age(params),
            FeatureSource::MileagePerYear => {
                let mileage = parse_number(params, FeatureSource::Mileage.key())?;
                let age = self.car_age(params)?;
                // +1 keeps brand-new cars finite; future model years clamp to 1
                Ok(mileage / (age + 1.0).max(1.0))
            }
            other => parse_number(params, other.key()),
        }
    }

    fn text_for(&self, source: FeatureSource, params: &RawParams) -> Result<String> {
        if source.is_flag() {
            return Ok(normalize_flag(params.get(source.key()).map(|s| s.as_str())).to_string());
        }
        if source == FeatureSource::Date {
            return Ok(self.listing_date(params)?.format("%Y-%m-%d").to_string());
        }

        let key = source.key();
        match lookup(params, key) {
            Some(value) => Ok(value.to_string()),
            None => self
                .schema
                .default_for(key)
                .map(|s| s.to_string())
                .ok_or_else(|| Error::MissingParameters(vec![key.to_string()])),
        }
    }

    fn car_age(&self, params: &RawParams) -> Result<f64> {
        let yom = parse_number(params, FeatureSource::Yom.key())?;
        let listing_year = self.listing_date(params)?.year() as f64;
        Ok(listing_year - yom)
    }

    fn listing_date(&self, params: &RawParams) -> Result<NaiveDate> {
        let key = FeatureSource::Date.key();
        match lookup(params, key) {
            Some(value) => {
                NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| Error::InvalidDate {
                    field: key.to_string(),
                    value: value.to_string(),
                })
            }
            None => Ok(self.reference_date),
        }
    }
}

/// Trimmed, non-blank parameter value
fn lookup<'p>(params: &'p RawParams, key: &str) -> Option<&'p str> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn parse_number(params: &RawParams, key: &str) -> Result<f64> {
    let raw = lookup(params, key).ok_or_else(|| Error::MissingParameters(vec![key.to_string()]))?;
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(Error::InvalidNumber {
            field: key.to_string(),
            value: raw.to_string(),
        }),
    }
}
