use crate::utils::error::{MonitorError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Planetary K-index value. Finite and non-negative; values above 9 are kept as-is.
///
/// An unknown level is modelled as `Option<DisturbanceLevel>::None`, never as zero.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct DisturbanceLevel(f64);

impl DisturbanceLevel {
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(MonitorError::contract(format!(
                "disturbance level must be finite and non-negative, got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for DisturbanceLevel {
    type Error = MonitorError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DisturbanceLevel> for f64 {
    fn from(level: DisturbanceLevel) -> f64 {
        level.0
    }
}

impl fmt::Display for DisturbanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Most recent observed index value from the current feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentReading {
    pub level: DisturbanceLevel,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// 1-based, step 1 is nearest-future
    pub step: usize,
    pub level: DisturbanceLevel,
    pub time_tag: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastSequence {
    points: Vec<ForecastPoint>,
}

impl ForecastSequence {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from bare values in feed order; steps are assigned 1..=n.
    pub fn from_levels(values: &[f64]) -> Result<Self> {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                Ok(ForecastPoint {
                    step: i + 1,
                    level: DisturbanceLevel::new(value)?,
                    time_tag: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { points })
    }

    /// Build from timestamped values in feed order; steps are assigned 1..=n.
    pub fn from_timed(values: Vec<(DateTime<Utc>, DisturbanceLevel)>) -> Self {
        let points = values
            .into_iter()
            .enumerate()
            .map(|(i, (time_tag, level))| ForecastPoint {
                step: i + 1,
                level,
                time_tag: Some(time_tag),
            })
            .collect();
        Self { points }
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn levels(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.level.value()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationRecord {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            country: None,
            latitude,
            longitude,
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// name + country
    pub fn identity(&self) -> String {
        match &self.country {
            Some(country) => format!("{}, {}", self.name, country),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    Safe,
    Caution,
    HighRisk,
    /// Only produced under `UnknownLevelPolicy::Surface`.
    Unknown,
}

impl RiskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "Safe",
            Self::Caution => "Caution",
            Self::HighRisk => "HighRisk",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How classification treats a missing disturbance level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnknownLevelPolicy {
    #[default]
    #[serde(rename = "safe")]
    TreatAsSafe,
    #[serde(rename = "surface")]
    Surface,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub location: LocationRecord,
    pub level: Option<DisturbanceLevel>,
    pub category: RiskCategory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub safe: usize,
    pub caution: usize,
    pub high_risk: usize,
    pub unknown: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTable {
    pub level: Option<DisturbanceLevel>,
    pub rows: Vec<RiskAssessment>,
}

impl RiskTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn summary(&self) -> CategorySummary {
        self.rows
            .iter()
            .fold(CategorySummary::default(), |mut acc, row| {
                match row.category {
                    RiskCategory::Safe => acc.safe += 1,
                    RiskCategory::Caution => acc.caution += 1,
                    RiskCategory::HighRisk => acc.high_risk += 1,
                    RiskCategory::Unknown => acc.unknown += 1,
                }
                acc
            })
    }
}

/// Why a report is degraded. Recorded instead of failing the refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum IngestionIssue {
    CurrentLevel(String),
    Forecast(String),
    ForecastEmpty(String),
}

/// Output of one refresh cycle, handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub generated_at: DateTime<Utc>,
    pub current_level: Option<DisturbanceLevel>,
    pub observed_at: Option<DateTime<Utc>>,
    pub forecast_level: Option<DisturbanceLevel>,
    pub forecast_label: String,
    pub forecast_step: Option<usize>,
    pub forecast: ForecastSequence,
    pub current_table: RiskTable,
    pub forecast_table: RiskTable,
    pub issues: Vec<IngestionIssue>,
}

impl RiskReport {
    pub fn is_degraded(&self) -> bool {
        !self.issues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disturbance_level_rejects_invalid_values() {
        assert!(DisturbanceLevel::new(0.0).is_ok());
        assert!(DisturbanceLevel::new(12.5).is_ok());
        assert!(DisturbanceLevel::new(-0.1).is_err());
        assert!(DisturbanceLevel::new(f64::NAN).is_err());
        assert!(DisturbanceLevel::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_disturbance_level_deserialize_validates() {
        let level: DisturbanceLevel = serde_json::from_str("4.33").unwrap();
        assert_eq!(level.value(), 4.33);
        assert!(serde_json::from_str::<DisturbanceLevel>("-1.0").is_err());
    }

    #[test]
    fn test_forecast_sequence_steps_are_one_based() {
        let seq = ForecastSequence::from_levels(&[2.0, 3.67, 5.0]).unwrap();
        assert_eq!(seq.len(), 3);
        let steps: Vec<usize> = seq.points().iter().map(|p| p.step).collect();
        assert_eq!(steps, vec![1, 2, 3]);
        assert_eq!(seq.levels(), vec![2.0, 3.67, 5.0]);
        assert!(ForecastSequence::from_levels(&[1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_location_identity() {
        let plain = LocationRecord::new("Tromsø", 69.65, 18.96);
        assert_eq!(plain.identity(), "Tromsø");
        let with_country = plain.with_country("Norway");
        assert_eq!(with_country.identity(), "Tromsø, Norway");
    }

    #[test]
    fn test_unknown_level_policy_serde_names() {
        let policy: UnknownLevelPolicy = serde_json::from_str("\"surface\"").unwrap();
        assert_eq!(policy, UnknownLevelPolicy::Surface);
        assert_eq!(
            serde_json::to_string(&UnknownLevelPolicy::TreatAsSafe).unwrap(),
            "\"safe\""
        );
    }
}
