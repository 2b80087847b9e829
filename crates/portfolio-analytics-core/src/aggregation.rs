use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::AnalyticsError;
use crate::types::*;
use crate::AnalyticsResult;

/// Input for building a weighted portfolio return series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioReturnsInput {
    /// Asset id -> weight in percent
    pub weights: WeightMap,
    /// Asset id -> periodic returns in percent (`null` for a missing period)
    pub series: AssetReturnSeries,
    /// Periods to aggregate; defaults to every period of the longest series
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices: Option<Vec<usize>>,
}

/// Weighted portfolio returns and their cumulative chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioReturnsOutput {
    pub indices: Vec<usize>,
    pub periodic_returns: Vec<Percent>,
    pub cumulative_returns: Vec<Percent>,
}

/// Weighted portfolio return for each requested period.
///
/// Each period sums `weight / 100 * value` over the assets with a positive
/// weight and an observation at that index. An asset without an observation
/// is skipped for that period rather than counted as a zero return, so the
/// period is carried by the remaining holdings alone. Zero total weight, or
/// no asset with a positive weight, yields zeros.
pub fn portfolio_returns(
    weights: &WeightMap,
    series: &AssetReturnSeries,
    indices: &[usize],
) -> Vec<Percent> {
    let active: Vec<(f64, &[Option<Percent>])> = weights
        .iter()
        .filter(|(_, w)| **w > 0.0)
        .filter_map(|(id, w)| series.get(id).map(|s| (*w, s.as_slice())))
        .collect();

    let total_weight: f64 = weights.values().filter(|w| **w > 0.0).sum();
    if total_weight == 0.0 || active.is_empty() {
        return vec![0.0; indices.len()];
    }

    indices
        .iter()
        .map(|&i| {
            active.iter().fold(0.0, |acc, (w, values)| {
                match observation(values, i) {
                    Some(v) => acc + (w / 100.0) * v,
                    None => acc,
                }
            })
        })
        .collect()
}

fn observation(values: &[Option<Percent>], index: usize) -> Option<Percent> {
    values
        .get(index)
        .copied()
        .flatten()
        .filter(|v| v.is_finite())
}

/// Chain periodic percentage returns into a cumulative percentage series.
///
/// Element 0 is always 0 and element `i` compounds the previous cumulative
/// value with the return of period `i - 1`, so the output has the same length
/// as the input and the last period's return is not yet included.
pub fn cumulative_returns(periodic: &[Percent]) -> Vec<Percent> {
    let mut cumulative = Vec::with_capacity(periodic.len());
    for i in 0..periodic.len() {
        if i == 0 {
            cumulative.push(0.0);
        } else {
            let prev = cumulative[i - 1];
            cumulative.push((1.0 + prev / 100.0) * (1.0 + periodic[i - 1] / 100.0) * 100.0 - 100.0);
        }
    }
    cumulative
}

/// Build the portfolio return series and its cumulative chain.
pub fn calculate_portfolio_returns(
    input: &PortfolioReturnsInput,
) -> AnalyticsResult<ComputationOutput<PortfolioReturnsOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if let Some((id, w)) = input.weights.iter().find(|(_, w)| !w.is_finite()) {
        return Err(AnalyticsError::InvalidInput {
            field: format!("weights.{}", id),
            reason: format!("Weight must be a finite number, got {}", w),
        });
    }

    for (id, w) in &input.weights {
        if *w > 0.0 && !input.series.contains_key(id) {
            warnings.push(format!("No return series for '{}'; asset skipped", id));
        }
    }

    let indices: Vec<usize> = match input.indices {
        Some(ref idx) => idx.clone(),
        None => {
            let longest = input.series.values().map(Vec::len).max().unwrap_or(0);
            (0..longest).collect()
        }
    };

    let gaps = input
        .weights
        .iter()
        .filter(|(_, w)| **w > 0.0)
        .filter_map(|(id, _)| input.series.get(id))
        .map(|values| indices.iter().filter(|&&i| observation(values, i).is_none()).count())
        .sum::<usize>();
    if gaps > 0 {
        warnings.push(format!(
            "{} missing observations skipped; affected periods use the remaining holdings only",
            gaps
        ));
    }

    let periodic = portfolio_returns(&input.weights, &input.series, &indices);
    let cumulative = cumulative_returns(&periodic);

    let output = PortfolioReturnsOutput {
        indices,
        periodic_returns: periodic,
        cumulative_returns: cumulative,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Weighted portfolio returns (missing observations skipped) with cumulative chaining",
        &serde_json::json!({
            "assets": input.weights.len(),
            "periods": output.indices.len(),
            "total_weight": input.weights.values().filter(|w| **w > 0.0).sum::<f64>(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Input for chaining an existing return series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CumulativeInput {
    pub returns: Vec<Percent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CumulativeOutput {
    pub periodic_returns: Vec<Percent>,
    pub cumulative_returns: Vec<Percent>,
}

/// Chain a periodic series, wrapped in the computation envelope.
pub fn calculate_cumulative_returns(
    input: &CumulativeInput,
) -> AnalyticsResult<ComputationOutput<CumulativeOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if let Some(i) = input.returns.iter().position(|r| !r.is_finite()) {
        return Err(AnalyticsError::InvalidInput {
            field: format!("returns[{}]", i),
            reason: "Return must be a finite number".into(),
        });
    }
    if input.returns.iter().any(|r| *r <= -100.0) {
        warnings.push(
            "A period loses 100% or more; later cumulative values are not meaningful".into(),
        );
    }

    let output = CumulativeOutput {
        cumulative_returns: cumulative_returns(&input.returns),
        periodic_returns: input.returns.clone(),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Cumulative chaining through the prior period, first element 0",
        &serde_json::json!({ "periods": input.returns.len() }),
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

    fn series(pairs: &[(&str, Vec<Option<f64>>)]) -> AssetReturnSeries {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_missing_observation_is_skipped() {
        let w = weights(&[("A", 50.0), ("B", 50.0)]);
        let s = series(&[
            ("A", vec![Some(2.0), Some(4.0)]),
            ("B", vec![Some(6.0), None]),
        ]);
        let r = portfolio_returns(&w, &s, &[0, 1]);
        assert_eq!(r, vec![4.0, 2.0]);
    }

    #[test]
    fn test_index_beyond_series_end_is_skipped() {
        let w = weights(&[("A", 50.0), ("B", 50.0)]);
        let s = series(&[("A", vec![Some(2.0)]), ("B", vec![Some(6.0), Some(8.0)])]);
        let r = portfolio_returns(&w, &s, &[1]);
        assert_eq!(r, vec![4.0]);
    }

    #[test]
    fn test_zero_weight_yields_zeros() {
        let w = weights(&[("A", 0.0), ("B", -5.0)]);
        let s = series(&[("A", vec![Some(2.0); 3]), ("B", vec![Some(1.0); 3])]);
        assert_eq!(portfolio_returns(&w, &s, &[0, 1, 2]), vec![0.0; 3]);
    }

    #[test]
    fn test_no_series_for_weighted_assets() {
        let w = weights(&[("X", 100.0)]);
        let s = series(&[("A", vec![Some(2.0); 2])]);
        assert_eq!(portfolio_returns(&w, &s, &[0, 1]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_cumulative_links_prior_period() {
        let c = cumulative_returns(&[10.0, 10.0, -50.0]);
        assert_eq!(c.len(), 3);
        assert_eq!(c[0], 0.0);
        assert!((c[1] - 10.0).abs() < 1e-9);
        assert!((c[2] - 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_cumulative_empty() {
        assert!(cumulative_returns(&[]).is_empty());
    }

    #[test]
    fn test_envelope_defaults_to_full_range() {
        let input = PortfolioReturnsInput {
            weights: weights(&[("A", 100.0), ("B", 20.0)]),
            series: series(&[("A", vec![Some(1.0), Some(2.0), None])]),
            indices: None,
        };
        let out = calculate_portfolio_returns(&input).unwrap();
        assert_eq!(out.result.indices, vec![0, 1, 2]);
        assert_eq!(out.result.periodic_returns, vec![1.0, 2.0, 0.0]);
        assert_eq!(out.result.cumulative_returns.len(), 3);
        // One missing-series warning for B, one skipped-gap warning for A
        assert_eq!(out.warnings.len(), 2);
    }

    #[test]
    fn test_non_finite_weight_rejected() {
        let input = PortfolioReturnsInput {
            weights: weights(&[("A", f64::NAN)]),
            series: series(&[("A", vec![Some(1.0)])]),
            indices: None,
        };
        assert!(calculate_portfolio_returns(&input).is_err());
    }

    #[test]
    fn test_cumulative_envelope() {
        let input = CumulativeInput {
            returns: vec![10.0, -100.0, 5.0],
        };
        let out = calculate_cumulative_returns(&input).unwrap();
        assert_eq!(out.result.cumulative_returns.len(), 3);
        assert!((out.result.cumulative_returns[1] - 10.0).abs() < 1e-9);
        assert!((out.result.cumulative_returns[2] - -100.0).abs() < 1e-9);
        assert_eq!(out.warnings.len(), 1);

        let bad = CumulativeInput {
            returns: vec![1.0, f64::NAN],
        };
        assert!(calculate_cumulative_returns(&bad).is_err());
    }
}
