//! Integration tests for autometric-core
//!
//! These tests exercise the full load → build features → predict → explain
//! workflow against model and schema files on disk.

use std::collections::HashMap;
use std::path::Path;

use autometric_core::{
    explain::Direction, score_csv, Error, PricePredictor, PredictorOptions, RawParams,
};
use chrono::NaiveDate;

/// Schema from the earlier model revision: 10,000 multiplier, town required,
/// listing date as a feature, amenity flags as categorical columns
fn legacy_schema() -> &'static str {
    r#"{
        "model_version": "2023-lkr-10k",
        "feature_names": ["Brand", "Model", "YOM", "Engine (cc)", "Gear", "Fuel Type",
                          "Millage(KM)", "Town", "Date", "POWER WINDOW", "Car_Age"],
        "categorical_feature_indices": [0, 1, 4, 5, 7, 8, 9],
        "price_multiplier": 10000,
        "required_parameters": ["brand", "model", "yom", "engineCC", "gear", "fuelType", "mileage", "town"]
    }"#
}

/// Two trees: age drives the price, power windows add a premium
fn legacy_model() -> &'static str {
    r#"{
        "base_score": 100.0,
        "num_features": 11,
        "trees": [
            {"nodes": [
                {"split": {"feature": 10, "condition": {"less_than": 6.0},
                           "left": 1, "right": 2, "default_left": true, "cover": 100}},
                {"leaf": {"value": 400.0, "cover": 40}},
                {"split": {"feature": 7, "condition": {"one_of": ["Colombo"]},
                           "left": 3, "right": 4, "cover": 60}},
                {"leaf": {"value": 250.0, "cover": 20}},
                {"leaf": {"value": 180.0, "cover": 40}}
            ]},
            {"nodes": [
                {"split": {"feature": 9, "condition": {"one_of": ["Available"]},
                           "left": 1, "right": 2, "cover": 100}},
                {"leaf": {"value": 15.0, "cover": 70}},
                {"leaf": {"value": -20.0, "cover": 30}}
            ]}
        ]
    }"#
}

fn write_files(dir: &Path) -> PricePredictor {
    let model_path = dir.join("model.json");
    let schema_path = dir.join("schema.json");
    std::fs::write(&model_path, legacy_model()).expect("write model");
    std::fs::write(&schema_path, legacy_schema()).expect("write schema");
    PricePredictor::from_files(&model_path, &schema_path).expect("load predictor")
}

fn params(pairs: &[(&str, &str)]) -> RawParams {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect::<HashMap<_, _>>()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
}

fn base_request() -> RawParams {
    params(&[
        ("brand", "Toyota"),
        ("model", "Vitz"),
        ("yom", "2016"),
        ("engineCC", "1000"),
        ("gear", "Automatic"),
        ("fuelType", "Petrol"),
        ("mileage", "45000"),
        ("town", "Colombo"),
        ("date", "2021-05-01"),
        ("powerWindow", "TRUE"),
    ])
}

// =============================================================================
// Loading and Prediction
// =============================================================================

#[test]
fn test_loaded_multiplier_drives_price() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = write_files(dir.path());
    assert_eq!(predictor.schema().model_version(), "2023-lkr-10k");

    // age 5 -> 400, windows available -> 15, base 100
    let quote = predictor.quote(&base_request(), today()).unwrap();
    assert_eq!(quote.price, 5_150_000);
    assert_eq!(quote.currency, "LKR");
}

#[test]
fn test_town_required_in_legacy_revision() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = write_files(dir.path());

    let mut request = base_request();
    request.remove("town");
    request.remove("mileage");

    match predictor.quote(&request, today()) {
        Err(Error::MissingParameters(missing)) => assert_eq!(missing, vec!["mileage", "town"]),
        other => panic!("expected missing parameters, got {:?}", other.map(|q| q.price)),
    }
}

#[test]
fn test_date_feature_and_reference_date() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = write_files(dir.path());

    let mut request = base_request();
    request.remove("date");
    let row = predictor.build_features(&request, today()).unwrap();
    assert_eq!(row.get(8).and_then(|v| v.as_str()), Some("2024-01-10"));
    // 2024 - 2016 = 8 -> older branch, Colombo
    let quote = predictor.quote(&request, today()).unwrap();
    assert_eq!(quote.price, (100.0 + 250.0 + 15.0) as i64 * 10_000);
}

// =============================================================================
// Explainability
// =============================================================================

#[test]
fn test_explanation_reconstructs_prediction() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = write_files(dir.path());

    for window in ["true", "false", "yes"] {
        let mut request = base_request();
        request.insert("powerWindow".into(), window.into());
        let quote = predictor.quote(&request, today()).unwrap();
        let explanation = quote.explainability.expect("explain enabled by default");

        let exact = (explanation.expected_value
            + explanation
                .all_factors
                .iter()
                .map(|f| f.shap_value)
                .sum::<f64>())
            * 10_000.0;
        assert!(
            (exact - quote.predicted_price).abs() < 1.0,
            "reconstruction failed for powerWindow={}",
            window
        );
    }
}

#[test]
fn test_unused_features_are_neutral() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = write_files(dir.path());
    let quote = predictor.quote(&base_request(), today()).unwrap();
    let explanation = quote.explainability.unwrap();

    let brand = explanation
        .all_factors
        .iter()
        .find(|f| f.feature == "Brand")
        .unwrap();
    assert_eq!(brand.direction, Direction::Neutral);
    assert_eq!(brand.effect, 0);

    let window = explanation
        .all_factors
        .iter()
        .find(|f| f.feature == "POWER WINDOW")
        .unwrap();
    assert_eq!(window.value, "Available");
    assert_eq!(window.direction, Direction::Increases);
}

#[test]
fn test_top_n_option() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = write_files(dir.path()).with_options(PredictorOptions {
        explain: true,
        top_n: 2,
    });
    let quote = predictor.quote(&base_request(), today()).unwrap();
    let explanation = quote.explainability.unwrap();
    assert_eq!(explanation.top_factors.len(), 2);
    assert_eq!(explanation.reasons.len(), 2);
    assert_eq!(explanation.all_factors.len(), 11);
}

// =============================================================================
// Batch Scoring
// =============================================================================

#[test]
fn test_batch_scoring_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = write_files(dir.path());

    let input = "\
Brand,Model,YOM,Engine (cc),Gear,Fuel Type,Millage(KM),Town,Date
Toyota,Vitz,2016,1000,Automatic,Petrol,45000,Colombo,2021-05-01
Toyota,Vitz,2016,1000,Automatic,Petrol,45000,,2021-05-01
";
    let input_path = dir.path().join("listings.csv");
    std::fs::write(&input_path, input).unwrap();

    let reader = std::fs::File::open(&input_path).unwrap();
    let mut output = Vec::new();
    let summary = score_csv(&predictor, reader, &mut output, today()).unwrap();

    assert_eq!(summary.rows, 2);
    assert_eq!(summary.priced, 1);
    assert_eq!(summary.failed, 1);

    let text = String::from_utf8(output).unwrap();
    // no powerWindow column: negative label -> -20
    assert!(text.contains("4800000"));
    assert!(text.contains("Missing required parameters: town"));
}
