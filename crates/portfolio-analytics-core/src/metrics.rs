use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::frequency::{detect_frequency, FrequencyInfo, ReturnFrequency};
use crate::types::*;
use crate::AnalyticsResult;

/// Tail probability used for CVaR and VaR95.
const TAIL_5: f64 = 0.05;
/// Tail probability used for VaR99.
const TAIL_1: f64 = 0.01;

/// Input for return-series metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsInput {
    /// Periodic returns in percent (1.5 = 1.5%)
    pub returns: Vec<Percent>,
    /// Annual risk-free rate as a decimal
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: Rate,
    /// Benchmark returns in percent, same length and frequency as `returns`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark_returns: Option<Vec<Percent>>,
    /// Date labels parallel to `returns`, used for frequency detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dates: Option<Vec<String>>,
}

pub fn default_risk_free_rate() -> Rate {
    0.02
}

/// Risk/return statistics for one return series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    /// Compound annual growth rate (percent)
    pub cagr: Percent,
    /// Annualised sample volatility (percent)
    pub volatility: Percent,
    pub sharpe: f64,
    pub sortino: f64,
    /// Mean of the worst 5% of returns (percent)
    pub cvar: Percent,
    /// Peak-to-trough decline of compounded wealth (percent, positive)
    pub max_drawdown: Percent,
    pub var95: Percent,
    pub var99: Percent,
    pub skewness: f64,
    /// Excess kurtosis
    pub kurtosis: f64,
    pub beta: f64,
    /// Annualised alpha against the benchmark (percent)
    pub alpha: Percent,
    pub frequency_name: ReturnFrequency,
    pub periods_per_year: u32,
}

impl MetricsResult {
    /// All-zero result carrying the detected frequency.
    pub fn zeroed(frequency: FrequencyInfo) -> Self {
        MetricsResult {
            cagr: 0.0,
            volatility: 0.0,
            sharpe: 0.0,
            sortino: 0.0,
            cvar: 0.0,
            max_drawdown: 0.0,
            var95: 0.0,
            var99: 0.0,
            skewness: 0.0,
            kurtosis: 0.0,
            beta: 0.0,
            alpha: 0.0,
            frequency_name: frequency.name,
            periods_per_year: frequency.periods_per_year,
        }
    }
}

/// Compute all metrics for a percentage return series.
///
/// Never fails: empty input yields a zeroed result and every degenerate
/// denominator (zero variance, empty downside set, flat benchmark) sets the
/// dependent statistic to 0. A benchmark of the wrong length is ignored.
pub fn calculate_metrics(
    returns: &[Percent],
    risk_free_rate: Rate,
    benchmark: Option<&[Percent]>,
    dates: Option<&[String]>,
) -> MetricsResult {
    let frequency = detect_frequency(returns.len(), dates);
    let n = returns.len();
    if n == 0 {
        return MetricsResult::zeroed(frequency);
    }

    let periods = f64::from(frequency.periods_per_year);
    let rets: Vec<f64> = returns.iter().map(|r| r / 100.0).collect();
    let mean_return = mean(&rets);

    let variance = sample_variance(&rets, mean_return);
    let std_dev = variance.sqrt();
    let volatility = std_dev * frequency.volatility_factor * 100.0;

    let cagr = compound_annual_growth(&rets, periods);

    // Per-period risk-free hurdle
    let rf_period = risk_free_rate / periods;
    let mean_excess = rets.iter().map(|r| r - rf_period).sum::<f64>() / n as f64;
    let annual_excess = mean_excess * periods;

    let sharpe = if std_dev > 0.0 {
        annual_excess / (std_dev * frequency.volatility_factor)
    } else {
        0.0
    };

    let downside_dev = downside_deviation(&rets, rf_period) * frequency.volatility_factor;
    let sortino = if downside_dev > 0.0 {
        annual_excess / downside_dev
    } else {
        0.0
    };

    let mut sorted = rets.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let cvar = conditional_tail_mean(&sorted, TAIL_5) * 100.0;
    let var95 = order_statistic(&sorted, TAIL_5) * 100.0;
    let var99 = order_statistic(&sorted, TAIL_1) * 100.0;

    let max_drawdown = max_drawdown(&rets) * 100.0;

    let (skewness, kurtosis) = if variance > 0.0 {
        let m3 = central_moment_sum(&rets, mean_return, 3) / (n - 1) as f64;
        let m4 = central_moment_sum(&rets, mean_return, 4) / (n - 1) as f64;
        (m3 / variance.powf(1.5), m4 / (variance * variance) - 3.0)
    } else {
        (0.0, 0.0)
    };

    let (beta, alpha) = match benchmark.filter(|b| b.len() == n) {
        Some(bench) => {
            let bench: Vec<f64> = bench.iter().map(|b| b / 100.0).collect();
            let bench_mean = mean(&bench);
            let bench_var = sample_variance(&bench, bench_mean);
            let beta = if bench_var > 0.0 {
                sample_covariance(&rets, &bench, mean_return, bench_mean) / bench_var
            } else {
                0.0
            };
            let alpha = (mean_return - beta * bench_mean) * periods * 100.0;
            (beta, alpha)
        }
        None => (0.0, 0.0),
    };

    MetricsResult {
        cagr,
        volatility,
        sharpe,
        sortino,
        cvar,
        max_drawdown,
        var95,
        var99,
        skewness,
        kurtosis,
        beta,
        alpha,
        frequency_name: frequency.name,
        periods_per_year: frequency.periods_per_year,
    }
}

/// Calculate return-series metrics wrapped in the computation envelope.
pub fn calculate_return_metrics(
    input: &MetricsInput,
) -> AnalyticsResult<ComputationOutput<MetricsResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let n = input.returns.len();
    if n == 0 {
        warnings.push("Empty return series; all metrics reported as 0".into());
    } else if n < 2 {
        warnings.push("Fewer than 2 observations; dispersion metrics reported as 0".into());
    }
    if let Some(ref bench) = input.benchmark_returns {
        if bench.len() != n {
            warnings.push(format!(
                "Benchmark has {} observations but returns have {}; beta and alpha not computed",
                bench.len(),
                n
            ));
        }
    }
    if let Some(ref dates) = input.dates {
        if dates.len() != n {
            warnings.push(format!(
                "Date labels ({}) do not match return observations ({})",
                dates.len(),
                n
            ));
        }
    }

    let output = calculate_metrics(
        &input.returns,
        input.risk_free_rate,
        input.benchmark_returns.as_deref(),
        input.dates.as_deref(),
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Return-series metrics (CAGR, volatility, Sharpe, Sortino, tail risk, drawdown, beta)",
        &serde_json::json!({
            "observations": n,
            "frequency": output.frequency_name,
            "periods_per_year": output.periods_per_year,
            "risk_free_rate": input.risk_free_rate,
            "variance": "sample (n-1)",
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Sample variance (n-1 denominator)
fn sample_variance(data: &[f64], mean: f64) -> f64 {
    let n = data.len();
    if n < 2 {
        return 0.0;
    }
    let sum_sq: f64 = data.iter().map(|x| (x - mean) * (x - mean)).sum();
    sum_sq / (n - 1) as f64
}

/// Covariance between two series (sample, n-1)
fn sample_covariance(x: &[f64], y: &[f64], x_mean: f64, y_mean: f64) -> f64 {
    let n = x.len();
    if n < 2 {
        return 0.0;
    }
    let sum: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(xi, yi)| (xi - x_mean) * (yi - y_mean))
        .sum();
    sum / (n - 1) as f64
}

fn central_moment_sum(data: &[f64], mean: f64, power: i32) -> f64 {
    data.iter().map(|x| (x - mean).powi(power)).sum()
}

/// Geometric annual growth, as a percentage.
fn compound_annual_growth(returns: &[f64], periods: f64) -> f64 {
    let years = returns.len() as f64 / periods;
    if years <= 0.0 {
        return 0.0;
    }
    let growth: f64 = returns.iter().map(|r| 1.0 + r).product();
    if growth <= 0.0 {
        // Wealth wiped out
        return -100.0;
    }
    (growth.powf(1.0 / years) - 1.0) * 100.0
}

/// Root mean square shortfall below `target`, over the shortfall periods only.
fn downside_deviation(returns: &[f64], target: f64) -> f64 {
    let shortfalls: Vec<f64> = returns
        .iter()
        .filter(|r| **r < target)
        .map(|r| (r - target) * (r - target))
        .collect();
    if shortfalls.is_empty() {
        return 0.0;
    }
    (shortfalls.iter().sum::<f64>() / shortfalls.len() as f64).sqrt()
}

/// Mean of the `floor(n * tail)` smallest values of an ascending slice.
fn conditional_tail_mean(sorted: &[f64], tail: f64) -> f64 {
    let k = (sorted.len() as f64 * tail).floor() as usize;
    if k == 0 {
        return 0.0;
    }
    mean(&sorted[..k])
}

/// Value at index `floor(n * tail)` of an ascending slice; 0 when that index is 0.
fn order_statistic(sorted: &[f64], tail: f64) -> f64 {
    let idx = (sorted.len() as f64 * tail).floor() as usize;
    if idx == 0 {
        return 0.0;
    }
    sorted[idx.min(sorted.len() - 1)]
}

/// Maximum drawdown of compounded wealth starting at 1 (as a fraction)
fn max_drawdown(returns: &[f64]) -> f64 {
    let mut wealth = 1.0;
    let mut peak = 1.0;
    let mut max_dd: f64 = 0.0;

    for r in returns {
        wealth *= 1.0 + r;
        if wealth > peak {
            peak = wealth;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - wealth) / peak);
        }
    }
    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_returns() -> Vec<f64> {
        vec![
            5.0, -2.0, 3.0, 1.0, -1.0, 4.0, 2.0, -3.0, 6.0, 1.0, -2.0, 3.0,
        ]
    }

    fn monthly_dates(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!("{}-{:02}-28", 2020 + i / 12, i % 12 + 1))
            .collect()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_series_is_zeroed() {
        let m = calculate_metrics(&[], 0.02, None, None);
        assert_eq!(m.cagr, 0.0);
        assert_eq!(m.volatility, 0.0);
        assert_eq!(m.sharpe, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
        assert_eq!(m.frequency_name, ReturnFrequency::Annual);
    }

    #[test]
    fn test_volatility_uses_sample_variance() {
        let returns = sample_returns();
        let dates = monthly_dates(returns.len());
        let m = calculate_metrics(&returns, 0.02, None, Some(&dates));
        assert_eq!(m.periods_per_year, 12);

        let dec: Vec<f64> = returns.iter().map(|r| r / 100.0).collect();
        let mu = dec.iter().sum::<f64>() / 12.0;
        let var = dec.iter().map(|r| (r - mu).powi(2)).sum::<f64>() / 11.0;
        assert!(close(m.volatility, var.sqrt() * 12f64.sqrt() * 100.0));
    }

    #[test]
    fn test_cagr_annualises_growth() {
        // Twelve monthly returns of 25% compound to 1.25^12 over one year
        let returns = vec![25.0; 12];
        let dates = monthly_dates(12);
        let m = calculate_metrics(&returns, 0.0, None, Some(&dates));
        assert!((m.cagr - (1.25f64.powi(12) - 1.0) * 100.0).abs() < 1e-6);
        // Constant returns: no dispersion, so ratios are guarded to 0
        assert_eq!(m.volatility, 0.0);
        assert_eq!(m.sharpe, 0.0);
        assert_eq!(m.skewness, 0.0);
        assert_eq!(m.kurtosis, 0.0);
    }

    #[test]
    fn test_cagr_total_loss() {
        let m = calculate_metrics(&[-100.0, 5.0], 0.0, None, None);
        assert_eq!(m.cagr, -100.0);
    }

    #[test]
    fn test_sharpe_formula() {
        let returns = sample_returns();
        let dates = monthly_dates(12);
        let m = calculate_metrics(&returns, 0.02, None, Some(&dates));

        let dec: Vec<f64> = returns.iter().map(|r| r / 100.0).collect();
        let mu = dec.iter().sum::<f64>() / 12.0;
        let sd = (dec.iter().map(|r| (r - mu).powi(2)).sum::<f64>() / 11.0).sqrt();
        let excess = dec.iter().map(|r| r - 0.02 / 12.0).sum::<f64>() / 12.0;
        let expected = excess * 12.0 / (sd * 12f64.sqrt());
        assert!(close(m.sharpe, expected));
    }

    #[test]
    fn test_sortino_population_downside() {
        let returns = sample_returns();
        let dates = monthly_dates(12);
        let m = calculate_metrics(&returns, 0.0, None, Some(&dates));

        // Downside set: -2, -1, -3, -2 (percent); mean of squares over those 4
        let dd = ((0.02f64.powi(2) + 0.01f64.powi(2) + 0.03f64.powi(2) + 0.02f64.powi(2)) / 4.0)
            .sqrt()
            * 12f64.sqrt();
        let mean = returns.iter().sum::<f64>() / 100.0 / 12.0;
        assert!(close(m.sortino, mean * 12.0 / dd));
    }

    #[test]
    fn test_sortino_no_downside() {
        let m = calculate_metrics(&[5.0, 4.0, 6.0], 0.0, None, None);
        assert_eq!(m.sortino, 0.0);
        assert!(m.sharpe > 0.0);
    }

    #[test]
    fn test_tail_statistics() {
        // 40 observations: -20, -19, ..., 19 (percent)
        let returns: Vec<f64> = (0..40).map(|i| i as f64 - 20.0).collect();
        let m = calculate_metrics(&returns, 0.02, None, None);
        // k = floor(40 * 0.05) = 2 -> mean(-20, -19)
        assert!(close(m.cvar, -19.5));
        // VaR95 is the single value at index 2
        assert!(close(m.var95, -18.0));
        // floor(40 * 0.01) = 0 -> guarded
        assert_eq!(m.var99, 0.0);
    }

    #[test]
    fn test_short_series_tails_are_zero() {
        let m = calculate_metrics(&sample_returns(), 0.02, None, None);
        assert_eq!(m.cvar, 0.0);
        assert_eq!(m.var95, 0.0);
        assert_eq!(m.var99, 0.0);
    }

    #[test]
    fn test_max_drawdown() {
        let m = calculate_metrics(&[10.0, -20.0, 5.0, -10.0], 0.0, None, None);
        // Peak 1.1, trough 1.1 * 0.8 * 1.05 * 0.9 = 0.8316
        assert!(close(m.max_drawdown, (1.1 - 0.8316) / 1.1 * 100.0));
    }

    #[test]
    fn test_moments_match_definition() {
        let returns = vec![1.0, 2.0, 3.0, 10.0];
        let m = calculate_metrics(&returns, 0.0, None, None);
        let dec: Vec<f64> = returns.iter().map(|r| r / 100.0).collect();
        let mu = dec.iter().sum::<f64>() / 4.0;
        let var = dec.iter().map(|r| (r - mu).powi(2)).sum::<f64>() / 3.0;
        let m3 = dec.iter().map(|r| (r - mu).powi(3)).sum::<f64>() / 3.0;
        let m4 = dec.iter().map(|r| (r - mu).powi(4)).sum::<f64>() / 3.0;
        assert!(close(m.skewness, m3 / var.powf(1.5)));
        assert!(close(m.kurtosis, m4 / (var * var) - 3.0));
        assert!(m.skewness > 0.0);
    }

    #[test]
    fn test_beta_alpha_against_scaled_benchmark() {
        let bench = sample_returns();
        let returns: Vec<f64> = bench.iter().map(|b| 2.0 * b + 0.5).collect();
        let dates = monthly_dates(12);
        let m = calculate_metrics(&returns, 0.02, Some(&bench), Some(&dates));
        assert!((m.beta - 2.0).abs() < 1e-9);
        // alpha = (mean(r) - 2 * mean(b)) * 12 * 100 = 0.005 * 1200
        assert!((m.alpha - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_benchmark_degenerate_or_mismatched() {
        let returns = sample_returns();
        let m = calculate_metrics(&returns, 0.02, Some(&[1.0, 2.0]), None);
        assert_eq!(m.beta, 0.0);
        assert_eq!(m.alpha, 0.0);

        let flat = vec![0.0; returns.len()];
        let m = calculate_metrics(&returns, 0.02, Some(&flat), None);
        assert_eq!(m.beta, 0.0);
    }

    #[test]
    fn test_envelope_warnings() {
        let input = MetricsInput {
            returns: sample_returns(),
            risk_free_rate: 0.02,
            benchmark_returns: Some(vec![1.0]),
            dates: None,
        };
        let out = calculate_return_metrics(&input).unwrap();
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.result.beta, 0.0);
        assert_eq!(out.metadata.precision, "ieee754_f64");
    }

    #[test]
    fn test_input_defaults_risk_free_rate() {
        let input: MetricsInput = serde_json::from_str(r#"{ "returns": [1.0, 2.0] }"#).unwrap();
        assert_eq!(input.risk_free_rate, 0.02);
        assert!(input.benchmark_returns.is_none());
    }
}
