use clap::Args;
use serde_json::Value;

use portfolio_analytics_core::aggregation::{
    self, CumulativeInput, PortfolioReturnsInput,
};
use portfolio_analytics_core::frequency::{self, FrequencyInput};
use portfolio_analytics_core::metrics::{self, default_risk_free_rate, MetricsInput};
use portfolio_analytics_core::normalization::{self, NormalizeInput};

use crate::input;

/// Arguments for frequency detection
#[derive(Args)]
pub struct FrequencyArgs {
    /// Path to JSON input file ({"series_len": n, "dates": [...]})
    #[arg(long)]
    pub input: Option<String>,

    /// Comma-separated date labels (e.g. "2024-01-31,2024-02-29")
    #[arg(long, value_delimiter = ',')]
    pub dates: Option<Vec<String>>,

    /// Number of observations, used when the dates do not decide
    #[arg(long)]
    pub length: Option<usize>,
}

/// Arguments for return-series metrics
#[derive(Args)]
pub struct MetricsArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Comma-separated periodic returns in percent (e.g. "1.5,-0.8,2.1")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub returns: Option<Vec<f64>>,

    /// Comma-separated benchmark returns in percent
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub benchmark: Option<Vec<f64>>,

    /// Comma-separated date labels parallel to the returns
    #[arg(long, value_delimiter = ',')]
    pub dates: Option<Vec<String>>,

    /// Annual risk-free rate as a decimal
    #[arg(long, default_value_t = default_risk_free_rate())]
    pub risk_free_rate: f64,
}

/// Arguments for weighted portfolio returns
#[derive(Args)]
pub struct PortfolioReturnsArgs {
    /// Path to JSON input file ({"weights": {...}, "series": {...}})
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for cumulative chaining
#[derive(Args)]
pub struct CumulativeArgs {
    /// Path to JSON input file ({"returns": [...]})
    #[arg(long)]
    pub input: Option<String>,

    /// Comma-separated periodic returns in percent
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub returns: Option<Vec<f64>>,
}

/// Arguments for weight normalization
#[derive(Args)]
pub struct NormalizeArgs {
    /// Path to JSON input file ({"weights": {...}})
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_frequency(args: FrequencyArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let freq_input: FrequencyInput = if args.dates.is_some() || args.length.is_some() {
        FrequencyInput {
            series_len: args.length,
            dates: args.dates,
        }
    } else {
        input::load(args.input.as_deref(), "frequency detection")?
    };
    let result = frequency::calculate_frequency(&freq_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_metrics(args: MetricsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let metrics_input: MetricsInput = match args.returns {
        Some(returns) => MetricsInput {
            returns,
            risk_free_rate: args.risk_free_rate,
            benchmark_returns: args.benchmark,
            dates: args.dates,
        },
        None => input::load(args.input.as_deref(), "return metrics")?,
    };
    let result = metrics::calculate_return_metrics(&metrics_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_portfolio_returns(
    args: PortfolioReturnsArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let pr_input: PortfolioReturnsInput = input::load(args.input.as_deref(), "portfolio returns")?;
    let result = aggregation::calculate_portfolio_returns(&pr_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_cumulative(args: CumulativeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let cum_input: CumulativeInput = match args.returns {
        Some(returns) => CumulativeInput { returns },
        None => input::load(args.input.as_deref(), "cumulative returns")?,
    };
    let result = aggregation::calculate_cumulative_returns(&cum_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_normalize(args: NormalizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let norm_input: NormalizeInput = input::load(args.input.as_deref(), "weight normalization")?;
    let result = normalization::calculate_normalized_weights(&norm_input)?;
    Ok(serde_json::to_value(result)?)
}
