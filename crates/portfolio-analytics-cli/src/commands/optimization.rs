use clap::Args;
use serde_json::{json, Value};

use portfolio_analytics_core::optimizer::{self, Objective, PortfolioOptimizationInput};

use crate::input;

/// Arguments for turnover-bounded weight optimization
#[derive(Args)]
pub struct OptimizeArgs {
    /// Path to JSON input file ({"weights", "series", "objective", "turnover_limit", ...})
    #[arg(long)]
    pub input: Option<String>,

    /// Objective to maximise: sharpe, risk, sortino, cvar (overrides the file)
    #[arg(long)]
    pub objective: Option<Objective>,

    /// Maximum per-asset weight change in percentage points (overrides the file)
    #[arg(long)]
    pub turnover_limit: Option<f64>,

    /// Size of one paired move in percentage points
    #[arg(long)]
    pub step_size: Option<f64>,

    /// Non-improving iterations tolerated before stopping
    #[arg(long)]
    pub max_stagnation: Option<u32>,

    /// Annual risk-free rate as a decimal
    #[arg(long)]
    pub risk_free_rate: Option<f64>,
}

pub fn run_optimize(args: OptimizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let raw: Value = input::load(args.input.as_deref(), "optimization")?;
    let merged = apply_overrides(raw, &args)?;
    let opt_input: PortfolioOptimizationInput = serde_json::from_value(merged)?;
    let result = optimizer::optimize_portfolio(&opt_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Merge command-line flags over the file input before it is typed.
fn apply_overrides(
    mut raw: Value,
    args: &OptimizeArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let obj = raw
        .as_object_mut()
        .ok_or("optimization input must be a JSON object")?;

    if let Some(objective) = args.objective {
        obj.insert("objective".into(), json!(objective));
    }
    if let Some(limit) = args.turnover_limit {
        obj.insert("turnover_limit".into(), json!(limit));
    }
    if let Some(rf) = args.risk_free_rate {
        obj.insert("risk_free_rate".into(), json!(rf));
    }
    if args.step_size.is_some() || args.max_stagnation.is_some() {
        let config = obj
            .entry("config")
            .or_insert_with(|| json!({}))
            .as_object_mut()
            .ok_or("'config' must be a JSON object")?;
        if let Some(step) = args.step_size {
            config.insert("step_size".into(), json!(step));
        }
        if let Some(n) = args.max_stagnation {
            config.insert("max_stagnation".into(), json!(n));
        }
    }
    Ok(raw)
}
