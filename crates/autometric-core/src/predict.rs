//! Prediction service
//!
//! [`PricePredictor`] is the immutable service context built once at
//! startup: the schema, the model and the explain settings. Handlers share
//! it behind an `Arc`; nothing in it changes after construction.

use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::explain::{self, Explanation, DEFAULT_TOP_N};
use crate::features::{FeatureBuilder, FeatureVector, RawParams};
use crate::model::{self, PriceModel};
use crate::schema::Schema;

/// Explainability settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorOptions {
    pub explain: bool,
    pub top_n: usize,
}

impl Default for PredictorOptions {
    fn default() -> Self {
        Self {
            explain: true,
            top_n: DEFAULT_TOP_N,
        }
    }
}

/// A scaled point prediction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Model output before scaling
    pub raw: f64,
    /// Scaled to currency, unrounded
    pub predicted_price: f64,
    /// Scaled to currency, rounded to a whole unit
    pub price: i64,
}

/// Successful price response body
#[derive(Debug, Clone, Serialize)]
pub struct PriceQuote {
    pub status: &'static str,
    pub predicted_price: f64,
    pub price: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explainability: Option<Explanation>,
}

pub struct PricePredictor {
    schema: Schema,
    model: Box<dyn PriceModel>,
    fingerprint: Option<String>,
    options: PredictorOptions,
}

impl PricePredictor {
    /// Pair a schema with a model, rejecting mismatched column layouts
    pub fn new(schema: Schema, model: Box<dyn PriceModel>) -> Result<Self> {
        if model.n_features() != schema.len() {
            return Err(Error::Model(format!(
                "Model expects {} features but schema declares {}",
                model.n_features(),
                schema.len()
            )));
        }
        model.check_schema(&schema)?;

        Ok(Self {
            schema,
            model,
            fingerprint: None,
            options: PredictorOptions::default(),
        })
    }

    /// Load the exported tree ensemble and its schema
    pub fn from_files(model_path: &Path, schema_path: &Path) -> Result<Self> {
        let schema = Schema::load(schema_path)?;
        let (ensemble, fingerprint) = model::load_tree_ensemble(model_path)?;
        let predictor = Self::new(schema, Box::new(ensemble))?.with_fingerprint(fingerprint);

        info!(
            model_version = predictor.schema.model_version(),
            features = predictor.schema.len(),
            multiplier = predictor.schema.price_multiplier(),
            fingerprint = predictor.fingerprint().unwrap_or("-"),
            "Loaded price model"
        );
        Ok(predictor)
    }

    pub fn with_options(mut self, options: PredictorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: String) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn options(&self) -> PredictorOptions {
        self.options
    }

    /// SHA-256 of the model file, when loaded from disk
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn build_features(&self, params: &RawParams, today: NaiveDate) -> Result<FeatureVector> {
        FeatureBuilder::new(&self.schema, today).build(params)
    }

    /// Run the model on a prepared row and scale the result
    pub fn predict_row(&self, row: &FeatureVector) -> Result<Prediction> {
        let raw = self.model.predict(row)?;
        if !raw.is_finite() {
            return Err(Error::Model(format!("Model returned non-finite output {}", raw)));
        }
        let predicted_price = raw * self.schema.price_multiplier();
        Ok(Prediction {
            raw,
            predicted_price,
            price: predicted_price.round() as i64,
        })
    }

    /// Explain a prediction already made for `row`
    pub fn explain_row(&self, row: &FeatureVector, prediction: &Prediction) -> Result<Explanation> {
        let attributions = self.model.attributions(row)?;
        explain::explain(
            &self.schema,
            row,
            &attributions,
            prediction.price,
            self.options.top_n,
        )
    }

    /// Full pipeline: parameters to priced (and optionally explained) quote
    pub fn quote(&self, params: &RawParams, today: NaiveDate) -> Result<PriceQuote> {
        let row = self.build_features(params, today)?;
        let prediction = self.predict_row(&row)?;

        let explainability = if self.options.explain {
            Some(self.explain_row(&row, &prediction)?)
        } else {
            None
        };

        debug!(
            price = prediction.price,
            raw = prediction.raw,
            "Predicted price"
        );

        Ok(PriceQuote {
            status: "success",
            predicted_price: prediction.predicted_price,
            price: prediction.price,
            currency: self.schema.currency().to_string(),
            explainability,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{corolla_params, fixture_predictor, reference_date, write_fixture_files};

    #[test]
    fn test_corolla_price() {
        let predictor = fixture_predictor();
        let quote = predictor.quote(&corolla_params(), reference_date()).unwrap();
        assert_eq!(quote.status, "success");
        assert_eq!(quote.currency, "LKR");
        assert_eq!(quote.price, 6_500_000);
        assert!((quote.predicted_price - 6_500_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_price_is_rounded_product_of_raw_output() {
        let predictor = fixture_predictor();
        let row = predictor
            .build_features(&corolla_params(), reference_date())
            .unwrap();
        let prediction = predictor.predict_row(&row).unwrap();
        assert_eq!(
            prediction.price,
            (prediction.raw * predictor.schema().price_multiplier()).round() as i64
        );
    }

    #[test]
    fn test_attribution_reconstruction() {
        let predictor = fixture_predictor();
        let mut params = corolla_params();
        params.insert("airCondition".into(), "true".into());
        params.insert("fuelType".into(), "Hybrid".into());
        params.insert("yom".into(), "2010".into());

        let quote = predictor.quote(&params, reference_date()).unwrap();
        let explanation = quote.explainability.unwrap();
        let multiplier = predictor.schema().price_multiplier();

        let exact = (explanation.expected_value
            + explanation.all_factors.iter().map(|f| f.shap_value).sum::<f64>())
            * multiplier;
        assert!((exact - quote.predicted_price).abs() < 1.0);

        let rounded = explanation.base_price
            + explanation.all_factors.iter().map(|f| f.effect).sum::<i64>();
        assert_eq!(rounded, quote.price);
        assert!((rounded as f64 - quote.predicted_price).abs() <= 1.0);
    }

    #[test]
    fn test_effects_reconstruct_price_with_fractional_attributions() {
        let schema = Schema::from_json(
            r#"{
                "feature_names": ["YOM", "Engine (cc)", "Millage(KM)"],
                "categorical_feature_indices": [],
                "price_multiplier": 1
            }"#,
        )
        .unwrap();
        let split = |feature: usize| {
            format!(
                r#"{{"nodes": [
                    {{"split": {{"feature": {}, "condition": {{"less_than": 0.5}},
                                 "left": 1, "right": 2, "cover": 10}}}},
                    {{"leaf": {{"value": 0.0, "cover": 5}}}},
                    {{"leaf": {{"value": 1.0, "cover": 5}}}}
                ]}}"#,
                feature
            )
        };
        let json = format!(
            r#"{{"num_features": 3, "trees": [{}, {}, {}]}}"#,
            split(0),
            split(1),
            split(2)
        );
        let model = crate::model::TreeEnsemble::from_slice(json.as_bytes()).unwrap();
        let predictor = PricePredictor::new(schema, Box::new(model)).unwrap();

        let row = FeatureVector::new(vec![crate::features::FeatureValue::Numeric(1.0); 3]);
        let prediction = predictor.predict_row(&row).unwrap();
        assert_eq!(prediction.price, 3);

        let explanation = predictor.explain_row(&row, &prediction).unwrap();
        // 1.5 rounds up to 2; each 0.5 attribution must not also round up
        assert_eq!(explanation.base_price, 2);
        let effects: i64 = explanation.all_factors.iter().map(|f| f.effect).sum();
        assert_eq!(explanation.base_price + effects, prediction.price);
        for factor in &explanation.all_factors {
            assert!((factor.effect as f64 - factor.shap_value).abs() <= 1.0);
        }
    }

    #[test]
    fn test_one_factor_per_feature() {
        let predictor = fixture_predictor();
        let quote = predictor.quote(&corolla_params(), reference_date()).unwrap();
        let explanation = quote.explainability.unwrap();
        assert_eq!(explanation.all_factors.len(), predictor.schema().len());
        assert_eq!(explanation.top_factors.len(), 5);
        assert_eq!(explanation.top_factors, explanation.all_factors[..5].to_vec());
        for pair in explanation.all_factors.windows(2) {
            assert!(pair[0].effect.abs() >= pair[1].effect.abs());
        }
    }

    #[test]
    fn test_quote_is_idempotent() {
        let predictor = fixture_predictor();
        let a = predictor.quote(&corolla_params(), reference_date()).unwrap();
        let b = predictor.quote(&corolla_params(), reference_date()).unwrap();
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::to_value(&b).unwrap()
        );
    }

    #[test]
    fn test_explain_disabled_omits_block() {
        let predictor = fixture_predictor().with_options(PredictorOptions {
            explain: false,
            top_n: 5,
        });
        let quote = predictor.quote(&corolla_params(), reference_date()).unwrap();
        assert!(quote.explainability.is_none());
        let json = serde_json::to_value(&quote).unwrap();
        assert!(json.get("explainability").is_none());
    }

    #[test]
    fn test_schema_model_mismatch_rejected() {
        let schema = Schema::from_json(
            r#"{"feature_names": ["YOM"], "price_multiplier": 10000}"#,
        )
        .unwrap();
        let model = crate::test_utils::fixture_model();
        assert!(PricePredictor::new(schema, Box::new(model)).is_err());
    }

    #[test]
    fn test_from_files_records_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let (model_path, schema_path) = write_fixture_files(dir.path());
        let predictor = PricePredictor::from_files(&model_path, &schema_path).unwrap();
        let bytes = std::fs::read(&model_path).unwrap();
        assert_eq!(predictor.fingerprint(), Some(model::fingerprint(&bytes).as_str()));
    }

    #[test]
    fn test_missing_files_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = PricePredictor::from_files(
            &dir.path().join("model.json"),
            &dir.path().join("schema.json"),
        );
        assert!(result.is_err());
    }
}
