//! Feature schema for the price model
//!
//! The schema declares the exact column order the model was trained on,
//! which columns are categorical, and the scaling multiplier that converts
//! raw model output into currency. It is loaded once at startup and never
//! mutated.
//!
//! Each schema column is bound to a [`FeatureSource`]: the raw request
//! parameter (or derived quantity) that fills it. Binding happens by explicit
//! `feature_sources` mapping or by normalized name match, so schemas exported
//! with names such as `"Millage(KM)"` or `"Engine (cc)"` resolve without
//! extra configuration.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Parameters required when the schema does not list its own
pub const DEFAULT_REQUIRED_PARAMETERS: &[&str] = &[
    "brand", "model", "yom", "engineCC", "gear", "fuelType", "mileage",
];

/// Where a feature column's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureSource {
    Brand,
    Model,
    Yom,
    EngineCc,
    Gear,
    FuelType,
    Mileage,
    Town,
    Date,
    Condition,
    Leasing,
    AirCondition,
    PowerSteering,
    PowerMirror,
    PowerWindow,
    /// Year of the listing date (derived)
    ListingYear,
    /// Listing year minus year of manufacture (derived)
    CarAge,
    /// Mileage divided by (age + 1) (derived)
    MileagePerYear,
}

impl FeatureSource {
    /// Query-string key for this source
    pub fn key(&self) -> &'static str {
        match self {
            Self::Brand => "brand",
            Self::Model => "model",
            Self::Yom => "yom",
            Self::EngineCc => "engineCC",
            Self::Gear => "gear",
            Self::FuelType => "fuelType",
            Self::Mileage => "mileage",
            Self::Town => "town",
            Self::Date => "date",
            Self::Condition => "condition",
            Self::Leasing => "leasing",
            Self::AirCondition => "airCondition",
            Self::PowerSteering => "powerSteering",
            Self::PowerMirror => "powerMirror",
            Self::PowerWindow => "powerWindow",
            Self::ListingYear => "listingYear",
            Self::CarAge => "carAge",
            Self::MileagePerYear => "mileagePerYear",
        }
    }

    pub fn all() -> &'static [FeatureSource] {
        &[
            Self::Brand,
            Self::Model,
            Self::Yom,
            Self::EngineCc,
            Self::Gear,
            Self::FuelType,
            Self::Mileage,
            Self::Town,
            Self::Date,
            Self::Condition,
            Self::Leasing,
            Self::AirCondition,
            Self::PowerSteering,
            Self::PowerMirror,
            Self::PowerWindow,
            Self::ListingYear,
            Self::CarAge,
            Self::MileagePerYear,
        ]
    }

    /// Normalized names that resolve to this source
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Brand => &["brand", "make"],
            Self::Model => &["model"],
            Self::Yom => &["yom", "year", "yearofmanufacture", "manufactureyear"],
            Self::EngineCc => &["enginecc", "engine", "enginesize", "enginecapacity"],
            Self::Gear => &["gear", "gearbox", "transmission"],
            Self::FuelType => &["fueltype", "fuel"],
            Self::Mileage => &["mileage", "mileagekm", "millage", "millagekm", "odometer"],
            Self::Town => &["town", "city", "location"],
            Self::Date => &["date", "listingdate"],
            Self::Condition => &["condition"],
            Self::Leasing => &["leasing"],
            Self::AirCondition => &["aircondition", "airconditioning", "ac"],
            Self::PowerSteering => &["powersteering"],
            Self::PowerMirror => &["powermirror", "powermirrors"],
            Self::PowerWindow => &["powerwindow", "powerwindows"],
            Self::ListingYear => &["listingyear"],
            Self::CarAge => &["carage", "age"],
            Self::MileagePerYear => &["mileageperyear", "millageperyear"],
        }
    }

    /// Resolve a schema feature name by normalized match against known aliases
    pub fn resolve(name: &str) -> Option<Self> {
        let normalized = normalize_name(name);
        Self::all()
            .iter()
            .copied()
            .find(|source| source.aliases().contains(&normalized.as_str()))
    }

    /// Sources that produce a number (may still be rendered as text in a
    /// categorical column)
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Yom
                | Self::EngineCc
                | Self::Mileage
                | Self::ListingYear
                | Self::CarAge
                | Self::MileagePerYear
        )
    }

    /// Boolean-like amenity flags normalized to Available / Not Available
    pub fn is_flag(&self) -> bool {
        matches!(
            self,
            Self::Leasing
                | Self::AirCondition
                | Self::PowerSteering
                | Self::PowerMirror
                | Self::PowerWindow
        )
    }

    /// Sources computed from other parameters rather than read directly
    pub fn is_derived(&self) -> bool {
        matches!(self, Self::ListingYear | Self::CarAge | Self::MileagePerYear)
    }
}

impl fmt::Display for FeatureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for FeatureSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|source| source.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown feature source: {}", s))
    }
}

/// Lowercase and drop everything that isn't alphanumeric
fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// A single model input column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub source: FeatureSource,
    pub categorical: bool,
}

/// Validated, immutable feature schema
#[derive(Debug, Clone)]
pub struct Schema {
    model_version: String,
    columns: Vec<Column>,
    price_multiplier: f64,
    currency: String,
    currency_symbol: String,
    required_parameters: Vec<String>,
    defaults: HashMap<String, String>,
}

/// Raw schema structure for JSON parsing
#[derive(Debug, Deserialize)]
struct RawSchema {
    model_version: Option<String>,
    feature_names: Vec<String>,
    #[serde(default)]
    categorical_feature_indices: Vec<usize>,
    price_multiplier: f64,
    currency: Option<String>,
    currency_symbol: Option<String>,
    required_parameters: Option<Vec<String>>,
    #[serde(default)]
    feature_sources: HashMap<String, String>,
    #[serde(default)]
    defaults: HashMap<String, String>,
}

impl Schema {
    /// Load a schema from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Schema(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate a schema from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        let raw: RawSchema = serde_json::from_str(content)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSchema) -> Result<Self> {
        if raw.feature_names.is_empty() {
            return Err(Error::Schema("feature_names is empty".into()));
        }

        let mut seen = HashSet::new();
        for name in &raw.feature_names {
            if !seen.insert(name.as_str()) {
                return Err(Error::Schema(format!("Duplicate feature name: {}", name)));
            }
        }

        let n = raw.feature_names.len();
        let mut categorical = vec![false; n];
        for &idx in &raw.categorical_feature_indices {
            if idx >= n {
                return Err(Error::Schema(format!(
                    "Categorical index {} out of range ({} features)",
                    idx, n
                )));
            }
            if categorical[idx] {
                return Err(Error::Schema(format!("Duplicate categorical index {}", idx)));
            }
            categorical[idx] = true;
        }

        for name in raw.feature_sources.keys() {
            if !raw.feature_names.contains(name) {
                return Err(Error::Schema(format!(
                    "feature_sources names unknown feature: {}",
                    name
                )));
            }
        }

        let mut columns = Vec::with_capacity(n);
        for (idx, name) in raw.feature_names.into_iter().enumerate() {
            let source = match raw.feature_sources.get(&name) {
                Some(key) => key.parse::<FeatureSource>().map_err(Error::Schema)?,
                None => FeatureSource::resolve(&name).ok_or_else(|| {
                    Error::Schema(format!(
                        "Cannot resolve feature '{}' to a known source (add it to feature_sources)",
                        name
                    ))
                })?,
            };

            if !source.is_numeric() && !categorical[idx] {
                return Err(Error::Schema(format!(
                    "Feature '{}' ({}) is text and must be listed in categorical_feature_indices",
                    name, source
                )));
            }

            columns.push(Column {
                name,
                source,
                categorical: categorical[idx],
            });
        }

        if !raw.price_multiplier.is_finite() || raw.price_multiplier <= 0.0 {
            return Err(Error::Schema(format!(
                "price_multiplier must be a positive number, got {}",
                raw.price_multiplier
            )));
        }

        let required_parameters = match raw.required_parameters {
            Some(list) => list,
            None => DEFAULT_REQUIRED_PARAMETERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };
        for key in &required_parameters {
            check_raw_key(key, "required_parameters")?;
        }

        let mut defaults = builtin_defaults();
        for (key, value) in raw.defaults {
            check_raw_key(&key, "defaults")?;
            defaults.insert(key, value);
        }

        Ok(Self {
            model_version: raw.model_version.unwrap_or_else(|| "unversioned".into()),
            columns,
            price_multiplier: raw.price_multiplier,
            currency: raw.currency.unwrap_or_else(|| "LKR".into()),
            currency_symbol: raw.currency_symbol.unwrap_or_else(|| "Rs.".into()),
            required_parameters,
            defaults,
        })
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn categorical_feature_indices(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.categorical)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn is_categorical(&self, index: usize) -> bool {
        self.columns.get(index).map(|c| c.categorical).unwrap_or(false)
    }

    pub fn price_multiplier(&self) -> f64 {
        self.price_multiplier
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn currency_symbol(&self) -> &str {
        &self.currency_symbol
    }

    /// Parameters checked for presence, in check order
    pub fn required_parameters(&self) -> &[String] {
        &self.required_parameters
    }

    /// Fallback value for an optional text parameter
    pub fn default_for(&self, key: &str) -> Option<&str> {
        self.defaults.get(key).map(|s| s.as_str())
    }
}

fn builtin_defaults() -> HashMap<String, String> {
    HashMap::from([
        ("town".to_string(), "Unknown".to_string()),
        ("condition".to_string(), "Used".to_string()),
    ])
}

/// Raw parameter keys must name a non-derived source
fn check_raw_key(key: &str, field: &str) -> Result<()> {
    match key.parse::<FeatureSource>() {
        Ok(source) if !source.is_derived() => Ok(()),
        _ => Err(Error::Schema(format!(
            "{} contains unknown parameter: {}",
            field, key
        ))),
    }
}
