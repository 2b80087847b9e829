pub mod error;
pub mod types;

#[cfg(feature = "analytics")]
pub mod frequency;

#[cfg(feature = "analytics")]
pub mod metrics;

#[cfg(feature = "analytics")]
pub mod aggregation;

#[cfg(feature = "analytics")]
pub mod normalization;

#[cfg(feature = "optimization")]
pub mod evaluator;

#[cfg(feature = "optimization")]
pub mod optimizer;

pub use error::AnalyticsError;
pub use types::*;

/// Standard result type for all portfolio-analytics operations
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
