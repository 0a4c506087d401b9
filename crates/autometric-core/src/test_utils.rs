//! Test utilities for autometric-core
//!
//! A small hand-built schema and tree ensemble that behave like an exported
//! model: five trees over fourteen columns, prices in units of 100,000 LKR.
//! For the Corolla request in [`corolla_params`] the model outputs exactly
//! 65.0 (Rs. 6,500,000).

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::features::RawParams;
use crate::model::TreeEnsemble;
use crate::predict::PricePredictor;
use crate::schema::Schema;

/// Listing date assumed when a request carries no `date`
pub const REFERENCE_DATE: &str = "2024-06-15";

pub const FIXTURE_SCHEMA_JSON: &str = r#"{
    "model_version": "fixture-1",
    "feature_names": [
        "Brand", "Model", "YOM", "Engine (cc)", "Gear", "Fuel Type", "Millage(KM)",
        "Town", "Condition", "AIR CONDITION", "POWER STEERING", "Leasing",
        "Car_Age", "Mileage_Per_Year"
    ],
    "categorical_feature_indices": [0, 1, 4, 5, 7, 8, 9, 10, 11],
    "price_multiplier": 100000,
    "currency": "LKR",
    "currency_symbol": "Rs."
}"#;

pub const FIXTURE_MODEL_JSON: &str = r#"{
    "base_score": 0.0,
    "num_features": 14,
    "trees": [
        {"nodes": [
            {"split": {"feature": 2, "condition": {"less_than": 2012.5},
                       "left": 1, "right": 2, "default_left": true, "cover": 1000}},
            {"leaf": {"value": 30.0, "cover": 400}},
            {"split": {"feature": 0, "condition": {"one_of": ["Toyota", "Honda"]},
                       "left": 3, "right": 4, "cover": 600}},
            {"leaf": {"value": 65.0, "cover": 300}},
            {"leaf": {"value": 50.0, "cover": 300}}
        ]},
        {"nodes": [
            {"split": {"feature": 6, "condition": {"less_than": 80000.0},
                       "left": 1, "right": 4, "default_left": true, "cover": 1000}},
            {"split": {"feature": 3, "condition": {"less_than": 1300.0},
                       "left": 2, "right": 3, "default_left": false, "cover": 550}},
            {"leaf": {"value": -2.0, "cover": 250}},
            {"leaf": {"value": 4.0, "cover": 300}},
            {"leaf": {"value": -6.0, "cover": 450}}
        ]},
        {"nodes": [
            {"split": {"feature": 4, "condition": {"one_of": ["Automatic"]},
                       "left": 1, "right": 2, "cover": 1000}},
            {"leaf": {"value": 3.0, "cover": 700}},
            {"leaf": {"value": -5.0, "cover": 300}}
        ]},
        {"nodes": [
            {"split": {"feature": 5, "condition": {"one_of": ["Hybrid"]},
                       "left": 1, "right": 2, "cover": 1000}},
            {"leaf": {"value": 6.0, "cover": 200}},
            {"split": {"feature": 12, "condition": {"less_than": 8.5},
                       "left": 3, "right": 4, "default_left": true, "cover": 800}},
            {"leaf": {"value": 2.0, "cover": 350}},
            {"leaf": {"value": -3.0, "cover": 450}}
        ]},
        {"nodes": [
            {"split": {"feature": 9, "condition": {"one_of": ["Available"]},
                       "left": 1, "right": 2, "cover": 1000}},
            {"leaf": {"value": 1.0, "cover": 800}},
            {"leaf": {"value": -4.0, "cover": 200}}
        ]}
    ]
}"#;

pub fn reference_date() -> NaiveDate {
    NaiveDate::parse_from_str(REFERENCE_DATE, "%Y-%m-%d").expect("valid fixture date")
}

pub fn fixture_schema() -> Schema {
    Schema::from_json(FIXTURE_SCHEMA_JSON).expect("valid fixture schema")
}

pub fn fixture_model() -> TreeEnsemble {
    TreeEnsemble::from_slice(FIXTURE_MODEL_JSON.as_bytes()).expect("valid fixture model")
}

pub fn fixture_predictor() -> PricePredictor {
    PricePredictor::new(fixture_schema(), Box::new(fixture_model())).expect("fixture agrees")
}

/// The seven required parameters for a 2015 Toyota Corolla
pub fn corolla_params() -> RawParams {
    [
        ("brand", "Toyota"),
        ("model", "Corolla"),
        ("yom", "2015"),
        ("engineCC", "1500"),
        ("gear", "Automatic"),
        ("fuelType", "Petrol"),
        ("mileage", "60000"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Write the fixture model and schema into `dir`, returning their paths
pub fn write_fixture_files(dir: &Path) -> (PathBuf, PathBuf) {
    let model_path = dir.join("model.json");
    let schema_path = dir.join("schema.json");
    std::fs::write(&model_path, FIXTURE_MODEL_JSON).expect("write fixture model");
    std::fs::write(&schema_path, FIXTURE_SCHEMA_JSON).expect("write fixture schema");
    (model_path, schema_path)
}
