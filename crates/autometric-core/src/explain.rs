//! Explainability engine
//!
//! Converts raw SHAP attributions for one prediction into currency effects,
//! impact shares and a ranked list of factors, with the strongest factors
//! rendered as sentences such as
//! `"YOM (2015) increases the price by ~Rs. 1,250,000 (41.3% importance)"`.

use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::features::FeatureVector;
use crate::model::Attributions;
use crate::schema::Schema;

/// Factors returned in `top_factors` and `reasons` unless configured otherwise
pub const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increases,
    Decreases,
    Neutral,
}

impl Direction {
    pub fn from_value(value: f64) -> Self {
        if value > 0.0 {
            Self::Increases
        } else if value < 0.0 {
            Self::Decreases
        } else {
            Self::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Increases => "increases",
            Self::Decreases => "decreases",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One feature's contribution to a prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Factor {
    pub feature: String,
    /// Observed value as sent to the model
    pub value: String,
    pub direction: Direction,
    /// Share of total absolute attribution, in percent
    pub impact_pct: f64,
    /// Signed effect in currency units (rounded)
    pub effect: i64,
    /// Raw attribution in model output units
    pub shap_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    /// Average prediction in currency units (rounded)
    pub base_price: i64,
    pub top_factors: Vec<Factor>,
    /// Every feature, by descending absolute effect
    pub all_factors: Vec<Factor>,
    pub reasons: Vec<String>,
    /// Baseline in model output units
    #[serde(skip)]
    pub expected_value: f64,
}

/// Build the ranked explanation for one row
///
/// `price` is the rounded scaled prediction. Effects are rounded so that
/// `base_price` plus every effect adds up to it exactly.
pub fn explain(
    schema: &Schema,
    row: &FeatureVector,
    attributions: &Attributions,
    price: i64,
    top_n: usize,
) -> Result<Explanation> {
    if attributions.values.len() != schema.len() || row.len() != schema.len() {
        return Err(Error::Model(format!(
            "Attribution count {} / row length {} do not match schema ({} features)",
            attributions.values.len(),
            row.len(),
            schema.len()
        )));
    }

    let multiplier = schema.price_multiplier();
    let total_abs: f64 = attributions.values.iter().map(|v| v.abs()).sum();
    let denominator = if total_abs == 0.0 { 1.0 } else { total_abs };

    let base_price = (attributions.expected_value * multiplier).round() as i64;
    let scaled: Vec<f64> = attributions.values.iter().map(|v| v * multiplier).collect();
    let effects = allocate_effects(&scaled, price - base_price);

    let mut all_factors: Vec<Factor> = schema
        .columns()
        .iter()
        .zip(row.values())
        .zip(&attributions.values)
        .zip(effects)
        .map(|(((column, value), &shap_value), effect)| Factor {
            feature: column.name.clone(),
            value: value.to_string(),
            direction: Direction::from_value(shap_value),
            impact_pct: round2(shap_value.abs() / denominator * 100.0),
            effect,
            shap_value,
        })
        .collect();

    // Stable: equal effects keep schema order
    all_factors.sort_by_key(|f| std::cmp::Reverse(f.effect.unsigned_abs()));

    let top_factors: Vec<Factor> = all_factors.iter().take(top_n).cloned().collect();
    let reasons = top_factors
        .iter()
        .map(|f| render_reason(f, schema.currency_symbol()))
        .collect();

    Ok(Explanation {
        base_price,
        top_factors,
        all_factors,
        reasons,
        expected_value: attributions.expected_value,
    })
}

/// Round currency effects so they sum to `target` (largest remainder).
///
/// Each effect starts at its nearest integer; the leftover units go to the
/// effects that rounding moved furthest from their exact value. Zero
/// attributions never absorb a unit, so neutral features stay at 0.
fn allocate_effects(exact: &[f64], target: i64) -> Vec<i64> {
    let mut effects: Vec<i64> = exact.iter().map(|v| v.round() as i64).collect();
    let residual = target - effects.iter().sum::<i64>();
    if residual == 0 {
        return effects;
    }

    let step = residual.signum();
    let mut order: Vec<usize> = (0..exact.len()).filter(|&i| exact[i] != 0.0).collect();
    if order.is_empty() {
        return effects;
    }
    // Stable: equal remainders keep schema order
    order.sort_by(|&a, &b| {
        let ra = (exact[a] - effects[a] as f64) * step as f64;
        let rb = (exact[b] - effects[b] as f64) * step as f64;
        rb.total_cmp(&ra)
    });

    for k in 0..residual.unsigned_abs() as usize {
        effects[order[k % order.len()]] += step;
    }
    effects
}

/// Human-readable sentence for one factor
pub fn render_reason(factor: &Factor, currency_symbol: &str) -> String {
    format!(
        "{} ({}) {} the price by ~{} {} ({:.1}% importance)",
        factor.feature,
        factor.value,
        factor.direction,
        currency_symbol,
        format_thousands(factor.effect.unsigned_abs()),
        factor.impact_pct
    )
}

/// 1234567 -> "1,234,567"
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureValue;

    fn schema() -> Schema {
        Schema::from_json(
            r#"{
                "feature_names": ["Brand", "YOM", "Millage(KM)", "Gear", "Fuel Type", "Engine (cc)", "Model"],
                "categorical_feature_indices": [0, 3, 4, 6],
                "price_multiplier": 100000
            }"#,
        )
        .unwrap()
    }

    fn row() -> FeatureVector {
        FeatureVector::new(vec![
            FeatureValue::Categorical("Toyota".into()),
            FeatureValue::Numeric(2015.0),
            FeatureValue::Numeric(60000.0),
            FeatureValue::Categorical("Automatic".into()),
            FeatureValue::Categorical("Petrol".into()),
            FeatureValue::Numeric(1500.0),
            FeatureValue::Categorical("Corolla".into()),
        ])
    }

    fn attributions(values: Vec<f64>) -> Attributions {
        Attributions {
            values,
            expected_value: 50.0,
        }
    }

    /// Explain with the price the attributions add up to
    fn explain_exact(attr: &Attributions, top_n: usize) -> Result<Explanation> {
        let raw = attr.expected_value + attr.values.iter().sum::<f64>();
        let price = (raw * 100_000.0).round() as i64;
        explain(&schema(), &row(), attr, price, top_n)
    }

    fn unit_schema() -> Schema {
        Schema::from_json(
            r#"{
                "feature_names": ["YOM", "Engine (cc)", "Millage(KM)"],
                "categorical_feature_indices": [],
                "price_multiplier": 1
            }"#,
        )
        .unwrap()
    }

    fn unit_row() -> FeatureVector {
        FeatureVector::new(vec![FeatureValue::Numeric(1.0); 3])
    }

    #[test]
    fn test_ranking_and_top_n() {
        let attr = attributions(vec![10.0, 12.5, -4.0, 3.0, 0.0, -0.5, 1.0]);
        let explanation = explain_exact(&attr, 5).unwrap();

        let order: Vec<&str> = explanation
            .all_factors
            .iter()
            .map(|f| f.feature.as_str())
            .collect();
        assert_eq!(
            order,
            vec!["YOM", "Brand", "Millage(KM)", "Gear", "Model", "Engine (cc)", "Fuel Type"]
        );
        assert_eq!(explanation.top_factors, explanation.all_factors[..5].to_vec());
        assert_eq!(explanation.reasons.len(), 5);
        assert_eq!(explanation.base_price, 5_000_000);
    }

    #[test]
    fn test_ties_keep_schema_order() {
        let attr = attributions(vec![1.0, -1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        let explanation = explain_exact(&attr, 5).unwrap();
        let order: Vec<&str> = explanation
            .all_factors
            .iter()
            .map(|f| f.feature.as_str())
            .collect();
        assert_eq!(
            order,
            vec!["Brand", "YOM", "Millage(KM)", "Gear", "Fuel Type", "Engine (cc)", "Model"]
        );
    }

    #[test]
    fn test_effects_directions_and_impacts() {
        let attr = attributions(vec![3.0, -1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let explanation = explain_exact(&attr, 5).unwrap();

        let brand = &explanation.all_factors[0];
        assert_eq!(brand.feature, "Brand");
        assert_eq!(brand.value, "Toyota");
        assert_eq!(brand.direction, Direction::Increases);
        assert_eq!(brand.effect, 300_000);
        assert_eq!(brand.impact_pct, 75.0);

        let yom = &explanation.all_factors[1];
        assert_eq!(yom.direction, Direction::Decreases);
        assert_eq!(yom.effect, -100_000);
        assert_eq!(yom.impact_pct, 25.0);

        assert!(explanation.all_factors[2..]
            .iter()
            .all(|f| f.direction == Direction::Neutral && f.effect == 0 && f.impact_pct == 0.0));

        let total: f64 = explanation.all_factors.iter().map(|f| f.impact_pct).sum();
        assert!((total - 100.0).abs() < 0.1);
    }

    #[test]
    fn test_all_zero_attributions() {
        let attr = attributions(vec![0.0; 7]);
        let explanation = explain_exact(&attr, 5).unwrap();
        assert!(explanation.all_factors.iter().all(|f| f.impact_pct == 0.0));
        assert!(explanation
            .all_factors
            .iter()
            .all(|f| f.direction == Direction::Neutral));
    }

    #[test]
    fn test_reason_sentence() {
        let attr = attributions(vec![0.0, 12.5, -4.0, 0.0, 0.0, 0.0, 0.0]);
        let explanation = explain_exact(&attr, 5).unwrap();
        assert_eq!(
            explanation.reasons[0],
            "YOM (2015) increases the price by ~Rs. 1,250,000 (75.8% importance)"
        );
        assert_eq!(
            explanation.reasons[1],
            "Millage(KM) (60000) decreases the price by ~Rs. 400,000 (24.2% importance)"
        );
    }

    #[test]
    fn test_top_n_larger_than_feature_count() {
        let attr = attributions(vec![1.0; 7]);
        let explanation = explain_exact(&attr, 50).unwrap();
        assert_eq!(explanation.top_factors.len(), 7);
    }

    #[test]
    fn test_length_mismatch_is_error() {
        let attr = attributions(vec![1.0; 3]);
        assert!(explain_exact(&attr, 5).is_err());
    }

    #[test]
    fn test_effects_sum_to_price_despite_half_units() {
        let attr = Attributions {
            values: vec![0.5, 0.5, 0.5],
            expected_value: 1.5,
        };
        let explanation = explain(&unit_schema(), &unit_row(), &attr, 3, 5).unwrap();
        assert_eq!(explanation.base_price, 2);

        let effects: i64 = explanation.all_factors.iter().map(|f| f.effect).sum();
        assert_eq!(explanation.base_price + effects, 3);
        for factor in &explanation.all_factors {
            assert!((factor.effect as f64 - factor.shap_value).abs() <= 1.0);
            assert_eq!(factor.direction, Direction::Increases);
        }
    }

    #[test]
    fn test_effects_sum_to_price_with_irregular_attributions() {
        let attr = Attributions {
            values: vec![123.4567, -45.6789, 0.0],
            expected_value: 1000.37,
        };
        // 1000.37 + 123.4567 - 45.6789 = 1078.1478
        let explanation = explain(&unit_schema(), &unit_row(), &attr, 1078, 5).unwrap();
        assert_eq!(explanation.base_price, 1000);

        let effect_of = |name: &str| {
            explanation
                .all_factors
                .iter()
                .find(|f| f.feature == name)
                .unwrap()
                .effect
        };
        assert_eq!(effect_of("YOM"), 124);
        assert_eq!(effect_of("Engine (cc)"), -46);
        assert_eq!(effect_of("Millage(KM)"), 0);
    }

    #[test]
    fn test_allocate_effects() {
        assert_eq!(allocate_effects(&[0.5, 0.5, 0.5], 1), vec![0, 0, 1]);
        assert_eq!(allocate_effects(&[0.4, 0.4, 0.4], 2), vec![1, 1, 0]);
        assert_eq!(allocate_effects(&[2.6, -1.2, 0.0], 1), vec![2, -1, 0]);
        assert_eq!(allocate_effects(&[0.0, 0.0], 1), vec![0, 0]);
        assert_eq!(allocate_effects(&[], 0), Vec::<i64>::new());
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(6_500_000), "6,500,000");
        assert_eq!(format_thousands(123_456_789), "123,456,789");
    }

    #[test]
    fn test_serialized_shape() {
        let attr = attributions(vec![1.0; 7]);
        let explanation = explain_exact(&attr, 5).unwrap();
        let json = serde_json::to_value(&explanation).unwrap();
        assert!(json.get("base_price").is_some());
        assert!(json.get("expected_value").is_none());
        assert_eq!(json["all_factors"][0]["direction"], "increases");
    }
}
