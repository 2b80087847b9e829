use napi::Result as NapiResult;
use napi_derive::napi;

use portfolio_analytics_core::{aggregation, frequency, metrics, normalization, optimizer};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Series analytics
// ---------------------------------------------------------------------------

#[napi]
pub fn detect_frequency(input_json: String) -> NapiResult<String> {
    let input: frequency::FrequencyInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = frequency::calculate_frequency(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn calculate_metrics(input_json: String) -> NapiResult<String> {
    let input: metrics::MetricsInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = metrics::calculate_return_metrics(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Portfolio construction
// ---------------------------------------------------------------------------

#[napi]
pub fn portfolio_returns(input_json: String) -> NapiResult<String> {
    let input: aggregation::PortfolioReturnsInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = aggregation::calculate_portfolio_returns(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn cumulative_returns(input_json: String) -> NapiResult<String> {
    let input: aggregation::CumulativeInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = aggregation::calculate_cumulative_returns(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn normalize_weights(input_json: String) -> NapiResult<String> {
    let input: normalization::NormalizeInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = normalization::calculate_normalized_weights(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Optimization
// ---------------------------------------------------------------------------

#[napi]
pub fn optimize_portfolio(input_json: String) -> NapiResult<String> {
    let input: optimizer::PortfolioOptimizationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = optimizer::optimize_portfolio(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
