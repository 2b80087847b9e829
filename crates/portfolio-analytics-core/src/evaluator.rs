use crate::aggregation::portfolio_returns;
use crate::error::AnalyticsError;
use crate::metrics::{calculate_metrics, MetricsResult};
use crate::types::*;
use crate::AnalyticsResult;

/// Scores a candidate allocation.
///
/// The optimizer only ever sees this seam; how a weight map turns into
/// metrics is up to the implementor.
pub trait PortfolioEvaluator {
    fn evaluate(&self, weights: &WeightMap) -> AnalyticsResult<MetricsResult>;
}

impl<F> PortfolioEvaluator for F
where
    F: Fn(&WeightMap) -> AnalyticsResult<MetricsResult>,
{
    fn evaluate(&self, weights: &WeightMap) -> AnalyticsResult<MetricsResult> {
        self(weights)
    }
}

/// Evaluates allocations by aggregating per-asset return series into a
/// portfolio series and running the metrics engine over it.
#[derive(Debug, Clone)]
pub struct ReturnSeriesEvaluator {
    series: AssetReturnSeries,
    indices: Vec<usize>,
    dates: Option<Vec<String>>,
    benchmark: Option<Vec<Percent>>,
    risk_free_rate: Rate,
}

impl ReturnSeriesEvaluator {
    /// Evaluate over every period of the longest series.
    pub fn new(series: AssetReturnSeries, risk_free_rate: Rate) -> Self {
        let longest = series.values().map(Vec::len).max().unwrap_or(0);
        ReturnSeriesEvaluator {
            series,
            indices: (0..longest).collect(),
            dates: None,
            benchmark: None,
            risk_free_rate,
        }
    }

    /// Restrict evaluation to the given periods.
    pub fn with_indices(mut self, indices: Vec<usize>) -> Self {
        self.indices = indices;
        self
    }

    /// Date labels for the full series; the labels of the evaluated periods
    /// drive frequency detection.
    pub fn with_dates(mut self, dates: Vec<String>) -> Self {
        self.dates = Some(dates);
        self
    }

    /// Benchmark returns for the evaluated periods.
    pub fn with_benchmark(mut self, benchmark: Vec<Percent>) -> Self {
        self.benchmark = Some(benchmark);
        self
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    fn selected_dates(&self) -> Option<Vec<String>> {
        let dates = self.dates.as_ref()?;
        self.indices
            .iter()
            .map(|&i| dates.get(i).cloned())
            .collect()
    }
}

impl PortfolioEvaluator for ReturnSeriesEvaluator {
    fn evaluate(&self, weights: &WeightMap) -> AnalyticsResult<MetricsResult> {
        if self.indices.is_empty() {
            return Err(AnalyticsError::InsufficientData(
                "No return periods to evaluate".into(),
            ));
        }
        if !weights.keys().any(|id| self.series.contains_key(id)) {
            return Err(AnalyticsError::EvaluationFailure(
                "None of the weighted assets has a return series".into(),
            ));
        }

        let returns = portfolio_returns(weights, &self.series, &self.indices);
        let dates = self.selected_dates();
        Ok(calculate_metrics(
            &returns,
            self.risk_free_rate,
            self.benchmark.as_deref(),
            dates.as_deref(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::ReturnFrequency;

    fn two_assets() -> AssetReturnSeries {
        let mut s = AssetReturnSeries::new();
        s.insert("A".into(), vec![Some(1.0), Some(2.0), Some(3.0), Some(-1.0)]);
        s.insert("B".into(), vec![Some(0.5), Some(-0.5), Some(1.5), Some(0.0)]);
        s
    }

    #[test]
    fn test_matches_direct_composition() {
        let eval = ReturnSeriesEvaluator::new(two_assets(), 0.02);
        let w: WeightMap = [("A".to_string(), 60.0), ("B".to_string(), 40.0)].into();
        let via_eval = eval.evaluate(&w).unwrap();

        let returns = portfolio_returns(&w, &two_assets(), &[0, 1, 2, 3]);
        let direct = calculate_metrics(&returns, 0.02, None, None);
        assert_eq!(via_eval, direct);
    }

    #[test]
    fn test_dates_follow_selected_indices() {
        let dates: Vec<String> = ["2021-01-01", "2021-01-02", "2021-02-01", "2021-03-01"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let w: WeightMap = [("A".to_string(), 100.0)].into();

        let all = ReturnSeriesEvaluator::new(two_assets(), 0.0).with_dates(dates.clone());
        assert_eq!(all.evaluate(&w).unwrap().frequency_name, ReturnFrequency::Daily);

        let monthly = ReturnSeriesEvaluator::new(two_assets(), 0.0)
            .with_indices(vec![1, 2, 3])
            .with_dates(dates);
        assert_eq!(monthly.evaluate(&w).unwrap().frequency_name, ReturnFrequency::Monthly);
    }

    #[test]
    fn test_unknown_assets_fail() {
        let eval = ReturnSeriesEvaluator::new(two_assets(), 0.02);
        let w: WeightMap = [("Z".to_string(), 100.0)].into();
        assert!(matches!(
            eval.evaluate(&w),
            Err(AnalyticsError::EvaluationFailure(_))
        ));
    }

    #[test]
    fn test_no_periods_fail() {
        let eval = ReturnSeriesEvaluator::new(AssetReturnSeries::new(), 0.02);
        let w: WeightMap = [("A".to_string(), 100.0)].into();
        assert!(eval.evaluate(&w).is_err());
    }

    #[test]
    fn test_closure_evaluator() {
        let eval = |w: &WeightMap| -> AnalyticsResult<MetricsResult> {
            let r: Vec<f64> = vec![w.get("A").copied().unwrap_or(0.0) / 10.0, 1.0];
            Ok(calculate_metrics(&r, 0.0, None, None))
        };
        let w: WeightMap = [("A".to_string(), 50.0)].into();
        assert!(eval.evaluate(&w).is_ok());
    }
}
