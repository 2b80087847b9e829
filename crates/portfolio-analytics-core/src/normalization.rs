use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::types::*;
use crate::AnalyticsResult;

/// Input for weight normalization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeInput {
    pub weights: WeightMap,
}

/// Output of weight normalization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeOutput {
    pub weights: WeightMap,
    /// Sum of the (non-negative) input weights
    pub original_total: Percent,
    /// 100 minus the sum of the rounded weights, before it was reassigned
    pub rounding_remainder: Percent,
    /// Holding(s) that absorbed the remainder
    pub adjusted_assets: Vec<AssetId>,
}

struct Normalized {
    weights: Vec<(AssetId, Decimal)>,
    original_total: f64,
    remainder: Decimal,
    adjusted: Vec<AssetId>,
}

/// Rescale weights to sum to exactly 100, rounded to one decimal place.
///
/// Weights are scaled proportionally and rounded to 0.1; the rounding
/// remainder goes to the largest holding (first by asset id on ties). A
/// remainder that would push it outside [0, 100] spills over to the next
/// largest. Negative or non-finite weights count as 0; an all-zero map is
/// split equally.
pub fn normalize_weights(weights: &WeightMap) -> WeightMap {
    to_weight_map(normalize(weights).weights)
}

fn normalize(weights: &WeightMap) -> Normalized {
    let cleaned: Vec<(&AssetId, f64)> = weights
        .iter()
        .map(|(id, w)| (id, if w.is_finite() && *w > 0.0 { *w } else { 0.0 }))
        .collect();
    let original_total: f64 = cleaned.iter().map(|(_, w)| w).sum();

    if cleaned.is_empty() {
        return Normalized {
            weights: Vec::new(),
            original_total,
            remainder: Decimal::ZERO,
            adjusted: Vec::new(),
        };
    }

    let n = cleaned.len() as f64;
    let mut rounded: Vec<(AssetId, Decimal)> = cleaned
        .iter()
        .map(|(id, w)| {
            let scaled = if original_total > 0.0 {
                w / original_total * 100.0
            } else {
                100.0 / n
            };
            ((*id).clone(), round_to_tenth(scaled))
        })
        .collect();

    let rounded_sum: Decimal = rounded.iter().map(|(_, w)| *w).sum();
    let remainder = dec!(100) - rounded_sum;

    // Largest first; the stable sort keeps asset-id order on ties
    let mut order: Vec<usize> = (0..rounded.len()).collect();
    order.sort_by(|a, b| rounded[*b].1.cmp(&rounded[*a].1));

    let mut adjusted = Vec::new();
    let mut left = remainder;
    for idx in order {
        if left.is_zero() {
            break;
        }
        let current = rounded[idx].1;
        let target = (current + left).max(Decimal::ZERO).min(dec!(100));
        if target != current {
            left -= target - current;
            rounded[idx].1 = target;
            adjusted.push(rounded[idx].0.clone());
        }
    }

    Normalized {
        weights: rounded,
        original_total,
        remainder,
        adjusted,
    }
}

/// Round half away from zero to one decimal place.
fn round_to_tenth(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .unwrap_or(Decimal::ZERO)
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

fn to_weight_map(weights: Vec<(AssetId, Decimal)>) -> WeightMap {
    weights
        .into_iter()
        .map(|(id, w)| (id, w.to_f64().unwrap_or(0.0)))
        .collect()
}

/// Normalize weights, wrapped in the computation envelope.
pub fn calculate_normalized_weights(
    input: &NormalizeInput,
) -> AnalyticsResult<ComputationOutput<NormalizeOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let clipped: Vec<&AssetId> = input
        .weights
        .iter()
        .filter(|(_, w)| !w.is_finite() || **w < 0.0)
        .map(|(id, _)| id)
        .collect();
    if !clipped.is_empty() {
        warnings.push(format!(
            "Negative or non-finite weights treated as 0: {}",
            clipped
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    let normalized = normalize(&input.weights);
    if normalized.original_total == 0.0 && !input.weights.is_empty() {
        warnings.push("All weights are zero; allocated equally across assets".into());
    }

    let output = NormalizeOutput {
        original_total: normalized.original_total,
        rounding_remainder: normalized.remainder.to_f64().unwrap_or(0.0),
        adjusted_assets: normalized.adjusted,
        weights: to_weight_map(normalized.weights),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Proportional normalization to 100 at one decimal, remainder to the largest holding",
        &serde_json::json!({
            "assets": input.weights.len(),
            "target_total": 100,
            "decimals": 1,
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(pairs: &[(&str, f64)]) -> WeightMap {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn total(w: &WeightMap) -> f64 {
        w.values().sum()
    }

    #[test]
    fn test_proportional_rescale() {
        let out = normalize_weights(&weights(&[("A", 30.0), ("B", 10.0)]));
        assert_eq!(out["A"], 75.0);
        assert_eq!(out["B"], 25.0);
    }

    #[test]
    fn test_remainder_goes_to_largest() {
        // 100/3 rounds to 33.3 each; the 0.1 remainder goes to the first of the tie
        let out = normalize_weights(&weights(&[("A", 1.0), ("B", 1.0), ("C", 1.0)]));
        assert_eq!(out["A"], 33.4);
        assert_eq!(out["B"], 33.3);
        assert_eq!(out["C"], 33.3);
        assert!((total(&out) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_remainder_to_strictly_largest() {
        let out = normalize_weights(&weights(&[("A", 1.0), ("B", 1.0), ("C", 2.0), ("D", 2.0)]));
        // 16.666.. -> 16.7, 33.333.. -> 33.3: sum 100.0, nothing to reassign
        assert_eq!(out["A"], 16.7);
        assert_eq!(out["C"], 33.3);

        let out = normalize_weights(&weights(&[("A", 1.0), ("B", 1.0), ("C", 1.0), ("Z", 3.0)]));
        // 16.7 * 3 + 50.0 = 100.1 -> largest (Z) absorbs -0.1
        assert_eq!(out["Z"], 49.9);
        assert_eq!(out["A"], 16.7);
    }

    #[test]
    fn test_zero_sum_splits_equally() {
        let out = normalize_weights(&weights(&[("A", 0.0), ("B", 0.0), ("C", 0.0), ("D", 0.0)]));
        for v in out.values() {
            assert_eq!(*v, 25.0);
        }
    }

    #[test]
    fn test_negative_weights_clamped() {
        let out = normalize_weights(&weights(&[("A", -20.0), ("B", 50.0)]));
        assert_eq!(out["A"], 0.0);
        assert_eq!(out["B"], 100.0);
    }

    #[test]
    fn test_empty_map() {
        assert!(normalize_weights(&WeightMap::new()).is_empty());
    }

    #[test]
    fn test_many_tiny_holdings_stay_in_bounds() {
        // 2000 equal holdings of 0.05 round up to 0.1 each; the -100 remainder
        // must spill across holdings instead of driving one negative
        let w: WeightMap = (0..2000).map(|i| (format!("A{:04}", i), 1.0)).collect();
        let out = normalize_weights(&w);
        assert!((total(&out) - 100.0).abs() < 1e-6);
        assert!(out.values().all(|v| (0.0..=100.0).contains(v)));
    }

    #[test]
    fn test_envelope_reports_adjustment() {
        let input = NormalizeInput {
            weights: weights(&[("A", 1.0), ("B", 1.0), ("C", 1.0), ("X", -1.0)]),
        };
        let out = calculate_normalized_weights(&input).unwrap();
        assert_eq!(out.result.original_total, 3.0);
        assert!((out.result.rounding_remainder - 0.1).abs() < 1e-12);
        assert_eq!(out.result.adjusted_assets, vec!["A".to_string()]);
        assert_eq!(out.warnings.len(), 1);
    }
}
