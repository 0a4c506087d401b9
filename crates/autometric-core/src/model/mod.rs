//! Price model abstraction
//!
//! The regression model is a black box behind [`PriceModel`]: a feature row
//! goes in, a raw scalar comes out, and it can attribute that scalar to the
//! individual features. [`TreeEnsemble`] is the gradient-boosted tree
//! implementation loaded from the exported model file, with exact TreeSHAP
//! attributions.

mod shap;
mod tree;

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::features::FeatureVector;
use crate::schema::Schema;

pub use tree::{Node, SplitCondition, Tree, TreeEnsemble};

/// Per-feature attributions for a single prediction
#[derive(Debug, Clone, PartialEq)]
pub struct Attributions {
    /// One value per feature, in schema order
    pub values: Vec<f64>,
    /// The model's average output (baseline the values are relative to)
    pub expected_value: f64,
}

impl Attributions {
    /// Baseline plus every attribution; equals the raw prediction
    pub fn total(&self) -> f64 {
        self.expected_value + self.values.iter().sum::<f64>()
    }
}

/// A trained regression model
pub trait PriceModel: Send + Sync {
    /// Number of input columns the model was trained on
    fn n_features(&self) -> usize;

    /// Raw point prediction for one row
    fn predict(&self, row: &FeatureVector) -> Result<f64>;

    /// SHAP-style attributions for one row
    fn attributions(&self, row: &FeatureVector) -> Result<Attributions>;

    /// Verify the model agrees with the schema beyond column count
    fn check_schema(&self, _schema: &Schema) -> Result<()> {
        Ok(())
    }
}

/// SHA-256 of the model file contents, hex encoded
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Read a model file, returning the ensemble and its fingerprint
pub fn load_tree_ensemble(path: &Path) -> Result<(TreeEnsemble, String)> {
    let bytes = std::fs::read(path).map_err(|e| {
        crate::error::Error::Model(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let ensemble = TreeEnsemble::from_slice(&bytes)?;
    Ok((ensemble, fingerprint(&bytes)))
}
