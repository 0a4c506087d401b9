//! Gradient-boosted tree ensemble
//!
//! Model file layout (JSON):
//!
//! ```json
//! {
//!   "base_score": 0.0,
//!   "num_features": 14,
//!   "trees": [
//!     { "nodes": [
//!       {"split": {"feature": 2, "condition": {"less_than": 2012.5},
//!                  "left": 1, "right": 2, "default_left": true, "cover": 100}},
//!       {"leaf": {"value": -0.4, "cover": 40}},
//!       {"leaf": {"value": 0.3, "cover": 60}}
//!     ]}
//!   ]
//! }
//! ```
//!
//! Node 0 is the root and children always come after their parent. `cover`
//! is the number (or weight) of training rows reaching the node; a split's
//! cover must equal the sum of its children's.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::features::{FeatureValue, FeatureVector};
use crate::schema::Schema;

use super::shap;
use super::{Attributions, PriceModel};

/// Relative slack allowed between a split's cover and its children's sum
const COVER_TOLERANCE: f64 = 1e-6;

/// Split test applied to one feature
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitCondition {
    /// Numeric: go left when `value < threshold`
    LessThan(f64),
    /// Categorical: go left when the category is in the set
    OneOf(Vec<String>),
}

impl SplitCondition {
    fn is_categorical(&self) -> bool {
        matches!(self, Self::OneOf(_))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
        cover: f64,
    },
    Split {
        feature: usize,
        condition: SplitCondition,
        left: usize,
        right: usize,
        /// Direction for missing values (NaN)
        #[serde(default)]
        default_left: bool,
        cover: f64,
    },
}

impl Node {
    pub fn cover(&self) -> f64 {
        match self {
            Self::Leaf { cover, .. } | Self::Split { cover, .. } => *cover,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Index of the child a row follows at a split node
    pub(super) fn next_node(
        condition: &SplitCondition,
        value: Option<&FeatureValue>,
        left: usize,
        right: usize,
        default_left: bool,
    ) -> usize {
        let goes_left = match (condition, value) {
            (SplitCondition::LessThan(threshold), Some(FeatureValue::Numeric(v)))
                if !v.is_nan() =>
            {
                *v < *threshold
            }
            (SplitCondition::OneOf(categories), Some(FeatureValue::Categorical(s))) => {
                categories.iter().any(|c| c == s)
            }
            _ => default_left,
        };
        if goes_left {
            left
        } else {
            right
        }
    }

    pub fn predict(&self, row: &FeatureVector) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    condition,
                    left,
                    right,
                    default_left,
                    ..
                } => {
                    idx = Self::next_node(condition, row.get(*feature), *left, *right, *default_left);
                }
            }
        }
    }

    /// Cover-weighted mean leaf value (the tree's output averaged over training data)
    pub fn expected_value(&self) -> f64 {
        // Children follow parents, so a reverse sweep sees every child first
        let mut expected = vec![0.0; self.nodes.len()];
        for idx in (0..self.nodes.len()).rev() {
            expected[idx] = match &self.nodes[idx] {
                Node::Leaf { value, .. } => *value,
                Node::Split {
                    left, right, cover, ..
                } => {
                    let left_cover = self.nodes[*left].cover();
                    let right_cover = self.nodes[*right].cover();
                    (left_cover * expected[*left] + right_cover * expected[*right]) / cover
                }
            };
        }
        expected[0]
    }

    fn validate(&self, tree_idx: usize, n_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::Model(format!("Tree {} has no nodes", tree_idx)));
        }

        let len = self.nodes.len();
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { value, cover } => {
                    if !value.is_finite() || !cover.is_finite() || *cover < 0.0 {
                        return Err(Error::Model(format!(
                            "Tree {} leaf {} has invalid value or cover",
                            tree_idx, idx
                        )));
                    }
                }
                Node::Split {
                    feature,
                    condition,
                    left,
                    right,
                    cover,
                    ..
                } => {
                    if *feature >= n_features {
                        return Err(Error::Model(format!(
                            "Tree {} node {} splits on feature {} (model has {})",
                            tree_idx, idx, feature, n_features
                        )));
                    }
                    for child in [left, right] {
                        if *child <= idx || *child >= len {
                            return Err(Error::Model(format!(
                                "Tree {} node {} has invalid child index {}",
                                tree_idx, idx, child
                            )));
                        }
                    }
                    if let SplitCondition::LessThan(threshold) = condition {
                        if threshold.is_nan() {
                            return Err(Error::Model(format!(
                                "Tree {} node {} has NaN threshold",
                                tree_idx, idx
                            )));
                        }
                    }
                    if !cover.is_finite() || *cover <= 0.0 {
                        return Err(Error::Model(format!(
                            "Tree {} node {} has non-positive cover",
                            tree_idx, idx
                        )));
                    }
                    let children = self.nodes[*left].cover() + self.nodes[*right].cover();
                    if (children - cover).abs() > COVER_TOLERANCE * cover {
                        return Err(Error::Model(format!(
                            "Tree {} node {} cover {} does not match children ({})",
                            tree_idx, idx, cover, children
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Additive ensemble of regression trees
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TreeEnsemble {
    #[serde(default)]
    pub base_score: f64,
    pub num_features: usize,
    pub trees: Vec<Tree>,
}

impl TreeEnsemble {
    /// Parse and validate a model from JSON bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let ensemble: Self = serde_json::from_slice(bytes)?;
        ensemble.validate()?;
        Ok(ensemble)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.base_score.is_finite() {
            return Err(Error::Model("base_score is not finite".into()));
        }
        if self.trees.is_empty() {
            return Err(Error::Model("Model has no trees".into()));
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(idx, self.num_features)?;
        }
        Ok(())
    }

    /// Baseline output: base score plus each tree's expected value
    pub fn expected_value(&self) -> f64 {
        self.base_score + self.trees.iter().map(Tree::expected_value).sum::<f64>()
    }

    fn check_row(&self, row: &FeatureVector) -> Result<()> {
        if row.len() != self.num_features {
            return Err(Error::Model(format!(
                "Feature row has {} values, model expects {}",
                row.len(),
                self.num_features
            )));
        }
        Ok(())
    }
}

impl PriceModel for TreeEnsemble {
    fn n_features(&self) -> usize {
        self.num_features
    }

    fn predict(&self, row: &FeatureVector) -> Result<f64> {
        self.check_row(row)?;
        Ok(self.base_score + self.trees.iter().map(|t| t.predict(row)).sum::<f64>())
    }

    fn attributions(&self, row: &FeatureVector) -> Result<Attributions> {
        self.check_row(row)?;
        let mut values = vec![0.0; self.num_features];
        for tree in &self.trees {
            shap::tree_shap(tree, row, &mut values);
        }
        Ok(Attributions {
            values,
            expected_value: self.expected_value(),
        })
    }

    fn check_schema(&self, schema: &Schema) -> Result<()> {
        if schema.len() != self.num_features {
            return Err(Error::Model(format!(
                "Schema declares {} features, model was trained on {}",
                schema.len(),
                self.num_features
            )));
        }
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            for node in &tree.nodes {
                if let Node::Split {
                    feature, condition, ..
                } = node
                {
                    if condition.is_categorical() != schema.is_categorical(*feature) {
                        return Err(Error::Model(format!(
                            "Tree {} splits on '{}' as {} but the schema declares it {}",
                            tree_idx,
                            schema.columns()[*feature].name,
                            if condition.is_categorical() { "categorical" } else { "numeric" },
                            if schema.is_categorical(*feature) { "categorical" } else { "numeric" },
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
