//! AutoMetric Core Library
//!
//! Used-car price prediction shared by the server and CLI:
//! - Feature schema loading and validation
//! - Feature builder (request parameters to model row)
//! - Gradient-boosted tree ensemble with exact TreeSHAP attributions
//! - Prediction service and explainability engine
//! - Batch scoring of listing CSVs
//! - Service configuration

pub mod batch;
pub mod config;
pub mod error;
pub mod explain;
pub mod features;
pub mod model;
pub mod predict;
pub mod schema;

/// Test utilities including a fixture schema and model
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use batch::{score_csv, BatchSummary};
pub use config::ServiceConfig;
pub use error::{Error, Result};
pub use explain::{Direction, Explanation, Factor};
pub use features::{FeatureBuilder, FeatureValue, FeatureVector, RawParams};
pub use model::{Attributions, PriceModel, TreeEnsemble};
pub use predict::{PriceQuote, PricePredictor, Prediction, PredictorOptions};
pub use schema::{FeatureSource, Schema};
