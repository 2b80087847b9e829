use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use crate::error::AnalyticsError;
use crate::types::{with_metadata, ComputationOutput};
use crate::AnalyticsResult;

/// Sampling frequency of a return series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annual,
}

impl ReturnFrequency {
    /// Number of periods in a year for annualisation
    pub fn periods_per_year(&self) -> u32 {
        match self {
            ReturnFrequency::Daily => 252,
            ReturnFrequency::Weekly => 52,
            ReturnFrequency::Monthly => 12,
            ReturnFrequency::Quarterly => 4,
            ReturnFrequency::Annual => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReturnFrequency::Daily => "daily",
            ReturnFrequency::Weekly => "weekly",
            ReturnFrequency::Monthly => "monthly",
            ReturnFrequency::Quarterly => "quarterly",
            ReturnFrequency::Annual => "annual",
        }
    }

    pub fn info(&self) -> FrequencyInfo {
        let periods_per_year = self.periods_per_year();
        FrequencyInfo {
            periods_per_year,
            name: *self,
            volatility_factor: f64::from(periods_per_year).sqrt(),
        }
    }

    /// Classify a gap (in days) between two consecutive observations.
    fn from_day_gap(days: f64) -> Self {
        if days <= 1.5 {
            ReturnFrequency::Daily
        } else if days <= 8.0 {
            ReturnFrequency::Weekly
        } else if days <= 35.0 {
            ReturnFrequency::Monthly
        } else if days <= 100.0 {
            ReturnFrequency::Quarterly
        } else {
            ReturnFrequency::Annual
        }
    }

    /// Guess the frequency from the number of observations alone.
    fn from_series_length(len: usize) -> Self {
        if len > 1000 {
            ReturnFrequency::Daily
        } else if len > 200 {
            ReturnFrequency::Weekly
        } else if len > 50 {
            ReturnFrequency::Monthly
        } else if len > 10 {
            ReturnFrequency::Quarterly
        } else {
            ReturnFrequency::Annual
        }
    }
}

impl fmt::Display for ReturnFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReturnFrequency {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(ReturnFrequency::Daily),
            "weekly" => Ok(ReturnFrequency::Weekly),
            "monthly" => Ok(ReturnFrequency::Monthly),
            "quarterly" => Ok(ReturnFrequency::Quarterly),
            "annual" | "annually" => Ok(ReturnFrequency::Annual),
            other => Err(AnalyticsError::InvalidInput {
                field: "frequency".into(),
                reason: format!(
                    "Unknown frequency '{}'. Use: daily, weekly, monthly, quarterly, annual",
                    other
                ),
            }),
        }
    }
}

/// Periodicity of a series and the factors derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyInfo {
    pub periods_per_year: u32,
    pub name: ReturnFrequency,
    /// sqrt(periods_per_year)
    pub volatility_factor: f64,
}

/// Infer the sampling frequency of a series.
///
/// When the first two date labels parse, the gap between them decides;
/// otherwise the series length is used. Never fails.
pub fn detect_frequency(series_len: usize, dates: Option<&[String]>) -> FrequencyInfo {
    let from_dates = dates
        .filter(|d| d.len() >= 2)
        .and_then(|d| day_gap(&d[0], &d[1]))
        .map(ReturnFrequency::from_day_gap);

    from_dates
        .unwrap_or_else(|| ReturnFrequency::from_series_length(series_len))
        .info()
}

/// Absolute gap between two date labels in (fractional) days.
fn day_gap(first: &str, second: &str) -> Option<f64> {
    let a = parse_date_label(first).ok()?;
    let b = parse_date_label(second).ok()?;
    let seconds = (b - a).num_seconds() as f64;
    Some((seconds / 86_400.0).abs())
}

/// Parse an ISO-style date label. Date-only labels are taken at midnight.
pub fn parse_date_label(label: &str) -> AnalyticsResult<NaiveDateTime> {
    let label = label.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(label) {
        return Ok(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(label, fmt) {
            return Ok(dt);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(label, "%Y/%m/%d") {
        return Ok(d.and_time(Default::default()));
    }
    let d = NaiveDate::parse_from_str(label, "%Y-%m-%d")?;
    Ok(d.and_time(Default::default()))
}

/// Input for standalone frequency detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyInput {
    /// Number of observations; defaults to the number of date labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_len: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dates: Option<Vec<String>>,
}

/// What decided the detected frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    DateGap,
    SeriesLength,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyOutput {
    #[serde(flatten)]
    pub info: FrequencyInfo,
    pub source: DetectionSource,
    /// Gap between the first two labels, when they parsed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_gap: Option<f64>,
}

/// Detect the frequency of a series, wrapped in the computation envelope.
pub fn calculate_frequency(
    input: &FrequencyInput,
) -> AnalyticsResult<ComputationOutput<FrequencyOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let dates = input.dates.as_deref();
    let series_len = input
        .series_len
        .or_else(|| dates.map(<[String]>::len))
        .unwrap_or(0);

    let gap = dates
        .filter(|d| d.len() >= 2)
        .and_then(|d| day_gap(&d[0], &d[1]));
    if dates.is_some_and(|d| d.len() >= 2) && gap.is_none() {
        warnings.push(
            "First two date labels did not parse; frequency inferred from series length".into(),
        );
    }
    if let (Some(d), Some(n)) = (dates, input.series_len) {
        if d.len() != n {
            warnings.push(format!("{} date labels for {} observations", d.len(), n));
        }
    }

    let output = FrequencyOutput {
        info: detect_frequency(series_len, dates),
        source: if gap.is_some() {
            DetectionSource::DateGap
        } else {
            DetectionSource::SeriesLength
        },
        day_gap: gap,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Frequency from the first date gap (1.5d/8d/35d/100d cut-offs), else series length",
        &serde_json::json!({
            "series_len": series_len,
            "dated": dates.is_some(),
        }),
        warnings,
        elapsed,
        output,
    ))
}
