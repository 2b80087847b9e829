use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::AnalyticsError;
use crate::evaluator::{PortfolioEvaluator, ReturnSeriesEvaluator};
use crate::metrics::{default_risk_free_rate, MetricsResult};
use crate::normalization::normalize_weights;
use crate::types::*;
use crate::AnalyticsResult;

/// Score assigned when the objective's metric is not a finite number.
pub const PENALTY_SCORE: f64 = -999.0;

/// Allowed deviation of the weight total from 100.
const SUM_TOLERANCE: f64 = 0.01;

/// Slack for floating-point drift on bound and budget checks.
const DRIFT: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What the search maximises. Risk-type objectives are negated so that a
/// higher score is always better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Objective {
    Sharpe,
    Risk,
    Sortino,
    Cvar,
}

impl Objective {
    /// Signed score of a metrics result; higher is better.
    pub fn score(&self, metrics: &MetricsResult) -> f64 {
        let raw = self.raw_score(metrics);
        if raw.is_finite() {
            raw
        } else {
            PENALTY_SCORE
        }
    }

    /// Search ordering: a non-finite metric ranks below every finite score,
    /// however negative.
    fn rank(&self, metrics: &MetricsResult) -> f64 {
        let raw = self.raw_score(metrics);
        if raw.is_finite() {
            raw
        } else {
            f64::NEG_INFINITY
        }
    }

    fn raw_score(&self, metrics: &MetricsResult) -> f64 {
        match self {
            Objective::Sharpe => metrics.sharpe,
            Objective::Risk => -metrics.volatility,
            Objective::Sortino => metrics.sortino,
            Objective::Cvar => -metrics.cvar.abs(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Objective::Sharpe => "sharpe",
            Objective::Risk => "risk",
            Objective::Sortino => "sortino",
            Objective::Cvar => "cvar",
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Objective {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sharpe" => Ok(Objective::Sharpe),
            "risk" | "volatility" => Ok(Objective::Risk),
            "sortino" => Ok(Objective::Sortino),
            "cvar" => Ok(Objective::Cvar),
            other => Err(AnalyticsError::InvalidInput {
                field: "objective".into(),
                reason: format!("Unknown objective '{}'. Use: sharpe, risk, sortino, cvar", other),
            }),
        }
    }
}

/// Search tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Size of one paired move, in percentage points (default 0.1).
    #[serde(default = "default_step_size")]
    pub step_size: Percent,
    /// Consecutive non-improving iterations before giving up (default 10).
    #[serde(default = "default_max_stagnation")]
    pub max_stagnation: u32,
}

fn default_step_size() -> Percent {
    0.1
}

fn default_max_stagnation() -> u32 {
    10
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            step_size: default_step_size(),
            max_stagnation: default_max_stagnation(),
        }
    }
}

/// Outcome of one optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub success: bool,
    pub objective: Objective,
    /// Normalized best weights (normalized start if rounding would lose ground);
    /// the caller's weights unchanged on failure
    pub weights: WeightMap,
    /// Objective score of the starting weights
    pub initial_metric: f64,
    /// Objective score of the returned weights
    pub final_metric: f64,
    pub iterations: u32,
    /// final_metric - initial_metric
    pub improvement: f64,
    /// Cumulative absolute weight change per asset
    pub turnover: WeightMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_metrics: Option<MetricsResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_metrics: Option<MetricsResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OptimizationResult {
    fn failure(objective: Objective, weights: WeightMap, error: &AnalyticsError) -> Self {
        OptimizationResult {
            success: false,
            objective,
            weights,
            initial_metric: 0.0,
            final_metric: 0.0,
            iterations: 0,
            improvement: 0.0,
            turnover: WeightMap::new(),
            initial_metrics: None,
            final_metrics: None,
            error: Some(error.to_string()),
        }
    }
}

/// Every weight within [0, 100] and the total within 0.01 of 100.
pub fn is_valid_allocation(weights: &WeightMap) -> bool {
    is_valid(weights.values().copied())
}

fn is_valid(weights: impl Iterator<Item = f64> + Clone) -> bool {
    let in_bounds = weights
        .clone()
        .all(|w| w.is_finite() && w >= -DRIFT && w <= 100.0 + DRIFT);
    in_bounds && (weights.sum::<f64>() - 100.0).abs() <= SUM_TOLERANCE
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

/// Greedy paired-move local search over portfolio weights.
///
/// Each iteration estimates a finite-difference gradient per asset, then
/// applies the first (increase, decrease) pair of `step_size` moves that
/// strictly improves the objective while respecting bounds, validity and
/// each asset's cumulative turnover budget.
pub struct LocalSearchOptimizer<'a, E: PortfolioEvaluator + ?Sized> {
    evaluator: &'a E,
    objective: Objective,
    config: OptimizerConfig,
}

impl<'a, E: PortfolioEvaluator + ?Sized> LocalSearchOptimizer<'a, E> {
    pub fn new(evaluator: &'a E, objective: Objective) -> Self {
        LocalSearchOptimizer {
            evaluator,
            objective,
            config: OptimizerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OptimizerConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the search from `weights`. The caller's map is only read; any
    /// evaluation error ends the run with `success == false`.
    pub fn optimize(&self, weights: &WeightMap, turnover_limit: Percent) -> OptimizationResult {
        let start = weights.clone();
        match self.search(&start, turnover_limit) {
            Ok(result) => result,
            Err(e) => {
                warn!(objective = %self.objective, error = %e, "optimization failed");
                OptimizationResult::failure(self.objective, start, &e)
            }
        }
    }

    fn search(
        &self,
        weights: &WeightMap,
        turnover_limit: Percent,
    ) -> AnalyticsResult<OptimizationResult> {
        let step = self.config.step_size;
        if !step.is_finite() || step <= 0.0 {
            return Err(AnalyticsError::InvalidInput {
                field: "step_size".into(),
                reason: format!("Step size must be a positive number, got {}", step),
            });
        }
        if !turnover_limit.is_finite() || turnover_limit < 0.0 {
            return Err(AnalyticsError::InvalidInput {
                field: "turnover_limit".into(),
                reason: format!(
                    "Turnover limit must be a non-negative number, got {}",
                    turnover_limit
                ),
            });
        }
        if weights.is_empty() {
            return Err(AnalyticsError::InvalidInput {
                field: "weights".into(),
                reason: "At least one asset is required".into(),
            });
        }

        let max_iterations = (turnover_limit / step).floor() as u32;
        let ids: Vec<AssetId> = weights.keys().cloned().collect();
        let mut current: Vec<f64> = weights.values().copied().collect();
        let mut turnover = vec![0.0; ids.len()];

        let initial_metrics = self.evaluator.evaluate(weights)?;
        let initial_rank = self.objective.rank(&initial_metrics);
        let mut best_score = initial_rank;

        let mut iteration: u32 = 0;
        let mut stagnation: u32 = 0;

        while iteration < max_iterations && stagnation < self.config.max_stagnation {
            iteration += 1;

            let gradient = self.estimate_gradient(&ids, &current, best_score)?;

            let mut ranked: Vec<usize> = (0..ids.len()).collect();
            ranked.sort_by(|a, b| gradient[*b].total_cmp(&gradient[*a]));
            let increase: Vec<usize> =
                ranked.iter().copied().filter(|&i| gradient[i] > 0.0).collect();
            let decrease: Vec<usize> =
                ranked.iter().copied().filter(|&i| gradient[i] < 0.0).collect();

            if increase.is_empty() || decrease.is_empty() {
                debug!(iteration, "no ascent direction; stopping");
                break;
            }

            let budget = Budget {
                current: &current,
                turnover: &turnover,
                limit: turnover_limit,
                step,
            };
            if !increase.iter().any(|&i| budget.can_increase(i))
                || !decrease.iter().any(|&i| budget.can_decrease(i))
            {
                debug!(iteration, "turnover budget or bounds exhausted; stopping");
                break;
            }

            match self.find_improving_move(&ids, &budget, &increase, &decrease, best_score)? {
                Some(mv) => {
                    debug!(
                        iteration,
                        up = %ids[mv.up],
                        down = %ids[mv.down],
                        score = mv.score,
                        "applied move"
                    );
                    current = mv.weights;
                    best_score = mv.score;
                    turnover[mv.up] += step;
                    turnover[mv.down] += step;
                    stagnation = 0;
                }
                None => {
                    stagnation += 1;
                    debug!(iteration, stagnation, "no improving pair");
                }
            }
        }

        let mut final_weights = normalize_weights(&to_weight_map(&ids, &current));
        let mut final_metrics = self.evaluator.evaluate(&final_weights)?;
        let mut turnover_map = to_weight_map(&ids, &turnover);

        // Rounding the best allocation to 0.1 can undo more than the search gained
        if self.objective.rank(&final_metrics) < initial_rank {
            let fallback = normalize_weights(weights);
            let fallback_metrics = self.evaluator.evaluate(&fallback)?;
            if self.objective.rank(&fallback_metrics) > self.objective.rank(&final_metrics) {
                debug!(
                    iterations = iteration,
                    "rounded result scores below start; keeping start"
                );
                turnover_map = fallback
                    .iter()
                    .map(|(id, w)| {
                        let before = weights.get(id).copied().unwrap_or(0.0);
                        (id.clone(), (w - before).abs())
                    })
                    .collect();
                final_weights = fallback;
                final_metrics = fallback_metrics;
            }
        }

        let initial_score = self.objective.score(&initial_metrics);
        let final_score = self.objective.score(&final_metrics);

        info!(
            objective = %self.objective,
            iterations = iteration,
            initial = initial_score,
            final_score,
            "optimization finished"
        );

        Ok(OptimizationResult {
            success: true,
            objective: self.objective,
            weights: final_weights,
            initial_metric: initial_score,
            final_metric: final_score,
            iterations: iteration,
            improvement: final_score - initial_score,
            turnover: turnover_map,
            initial_metrics: Some(initial_metrics),
            final_metrics: Some(final_metrics),
            error: None,
        })
    }

    /// Forward difference per asset: raise it by one step, funded by the first
    /// other asset holding at least one step. Invalid candidates score 0; a
    /// non-finite side of the difference saturates to an infinite slope.
    fn estimate_gradient(
        &self,
        ids: &[AssetId],
        current: &[f64],
        base_score: f64,
    ) -> AnalyticsResult<Vec<f64>> {
        let step = self.config.step_size;
        (0..current.len())
            .map(|up| {
                let donor = (0..current.len()).find(|&d| d != up && current[d] >= step - DRIFT);
                let Some(down) = donor else {
                    return Ok(0.0);
                };
                let candidate = shifted(current, up, down, step);
                if !is_valid(candidate.iter().copied()) {
                    return Ok(0.0);
                }
                let score = self.score(ids, &candidate)?;
                Ok(slope(score, base_score, step))
            })
            .collect()
    }

    /// First (increase, decrease) pair whose move is affordable, valid and
    /// strictly better than `best_score`.
    fn find_improving_move(
        &self,
        ids: &[AssetId],
        budget: &Budget<'_>,
        increase: &[usize],
        decrease: &[usize],
        best_score: f64,
    ) -> AnalyticsResult<Option<Move>> {
        for &up in increase {
            if !budget.can_increase(up) {
                continue;
            }
            for &down in decrease {
                if down == up || !budget.can_decrease(down) {
                    continue;
                }
                let candidate = shifted(budget.current, up, down, budget.step);
                if !is_valid(candidate.iter().copied()) {
                    continue;
                }
                let score = self.score(ids, &candidate)?;
                if score > best_score {
                    return Ok(Some(Move {
                        up,
                        down,
                        weights: candidate,
                        score,
                    }));
                }
            }
        }
        Ok(None)
    }

    fn score(&self, ids: &[AssetId], weights: &[f64]) -> AnalyticsResult<f64> {
        let metrics = self.evaluator.evaluate(&to_weight_map(ids, weights))?;
        Ok(self.objective.rank(&metrics))
    }
}

/// Turnover and bound checks for a single step.
struct Budget<'a> {
    current: &'a [f64],
    turnover: &'a [f64],
    limit: f64,
    step: f64,
}

impl Budget<'_> {
    fn has_turnover(&self, i: usize) -> bool {
        self.turnover[i] + self.step <= self.limit + DRIFT
    }

    fn can_increase(&self, i: usize) -> bool {
        self.has_turnover(i) && self.current[i] + self.step <= 100.0 + DRIFT
    }

    fn can_decrease(&self, i: usize) -> bool {
        self.has_turnover(i) && self.current[i] - self.step >= -DRIFT
    }
}

struct Move {
    up: usize,
    down: usize,
    weights: Vec<f64>,
    score: f64,
}

fn slope(candidate: f64, base: f64, step: f64) -> f64 {
    match (candidate.is_finite(), base.is_finite()) {
        (true, true) => (candidate - base) / step,
        (false, true) => f64::NEG_INFINITY,
        (true, false) => f64::INFINITY,
        (false, false) => 0.0,
    }
}

fn shifted(weights: &[f64], up: usize, down: usize, step: f64) -> Vec<f64> {
    let mut candidate = weights.to_vec();
    candidate[up] += step;
    candidate[down] -= step;
    candidate
}

fn to_weight_map(ids: &[AssetId], values: &[f64]) -> WeightMap {
    ids.iter().cloned().zip(values.iter().copied()).collect()
}

/// Function form of [`LocalSearchOptimizer::optimize`].
pub fn optimize_weights<E: PortfolioEvaluator + ?Sized>(
    evaluator: &E,
    weights: &WeightMap,
    objective: Objective,
    turnover_limit: Percent,
    config: &OptimizerConfig,
) -> OptimizationResult {
    LocalSearchOptimizer::new(evaluator, objective)
        .with_config(config.clone())
        .optimize(weights, turnover_limit)
}

// ---------------------------------------------------------------------------
// Return-series optimization entry point
// ---------------------------------------------------------------------------

/// Input for optimizing weights against per-asset return series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioOptimizationInput {
    /// Starting weights in percent
    pub weights: WeightMap,
    /// Asset id -> periodic returns in percent
    pub series: AssetReturnSeries,
    pub objective: Objective,
    /// Maximum cumulative weight change per asset, in percentage points
    pub turnover_limit: Percent,
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: Rate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dates: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark_returns: Option<Vec<Percent>>,
    #[serde(default)]
    pub config: OptimizerConfig,
}

/// Optimize weights by evaluating each candidate through the return
/// aggregator and metrics engine. Search failures are reported inside the
/// result, not as an `Err`.
pub fn optimize_portfolio(
    input: &PortfolioOptimizationInput,
) -> AnalyticsResult<ComputationOutput<OptimizationResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let mut evaluator = ReturnSeriesEvaluator::new(input.series.clone(), input.risk_free_rate);
    if let Some(ref indices) = input.indices {
        evaluator = evaluator.with_indices(indices.clone());
    }
    if let Some(ref dates) = input.dates {
        evaluator = evaluator.with_dates(dates.clone());
    }
    if let Some(ref bench) = input.benchmark_returns {
        evaluator = evaluator.with_benchmark(bench.clone());
    }

    if !is_valid_allocation(&input.weights) {
        warnings.push(
            "Starting weights are not a valid allocation (bounds [0, 100], total 100)".into(),
        );
    }

    let result = optimize_weights(
        &evaluator,
        &input.weights,
        input.objective,
        input.turnover_limit,
        &input.config,
    );
    if let Some(ref e) = result.error {
        warnings.push(format!("Optimization failed: {}", e));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Turnover-bounded local search (finite-difference gradient, paired step moves)",
        &serde_json::json!({
            "objective": input.objective,
            "turnover_limit": input.turnover_limit,
            "step_size": input.config.step_size,
            "max_stagnation": input.config.max_stagnation,
            "max_iterations": (input.turnover_limit / input.config.step_size).floor(),
            "periods": evaluator.indices().len(),
        }),
        warnings,
        elapsed,
        result,
    ))
}
