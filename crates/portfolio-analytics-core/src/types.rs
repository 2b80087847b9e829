use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Periodic or annualised returns expressed in percent (1.5 = 1.5%).
pub type Percent = f64;

/// Rates expressed as decimals (0.02 = 2%). Never as percentages.
pub type Rate = f64;

/// Asset identifier as supplied by the caller.
pub type AssetId = String;

/// Asset id -> weight in percentage points. Iteration follows asset-id order,
/// which is also the tie-break order for every ranking in the crate.
pub type WeightMap = BTreeMap<AssetId, Percent>;

/// Asset id -> periodic percentage returns. `None` marks a missing observation.
pub type AssetReturnSeries = BTreeMap<AssetId, Vec<Option<Percent>>>;

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "ieee754_f64".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_metadata() {
        let out = with_metadata(
            "Test",
            &serde_json::json!({ "observations": 3 }),
            vec!["note".into()],
            42,
            1.5_f64,
        );
        assert_eq!(out.metadata.precision, "ieee754_f64");
        assert_eq!(out.metadata.computation_time_us, 42);
        assert_eq!(out.assumptions["observations"], 3);
        assert_eq!(out.warnings.len(), 1);
    }
}
