use crate::domain::model::{DisturbanceLevel, ForecastSequence};
use crate::utils::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_STEP_HOURS: u32 = 3;
pub const UNAVAILABLE_LABEL: &str = "Unavailable";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSelection {
    pub level: Option<DisturbanceLevel>,
    pub label: String,
    /// 實際使用的 1-based step; 無預報資料時為 None
    pub effective_step: Option<usize>,
}

impl ForecastSelection {
    pub fn is_available(&self) -> bool {
        self.effective_step.is_some()
    }
}

/// Pick the forecast value for `requested_step`.
///
/// Steps beyond the end of `sequence` reuse its last point. An empty sequence
/// falls back to `fallback` (normally the current level) labelled "Unavailable".
/// Only a non-positive `requested_step` is an error.
pub fn select(
    sequence: &ForecastSequence,
    requested_step: i64,
    fallback: Option<DisturbanceLevel>,
    step_hours: u32,
) -> Result<ForecastSelection> {
    if requested_step <= 0 {
        return Err(MonitorError::contract(format!(
            "requested forecast step must be positive, got {}",
            requested_step
        )));
    }

    let points = sequence.points();
    if points.is_empty() {
        return Ok(ForecastSelection {
            level: fallback,
            label: UNAVAILABLE_LABEL.to_string(),
            effective_step: None,
        });
    }

    let requested = usize::try_from(requested_step).unwrap_or(usize::MAX);
    let effective = requested.min(points.len());
    let point = &points[effective - 1];

    Ok(ForecastSelection {
        level: Some(point.level),
        label: horizon_label(effective, step_hours),
        effective_step: Some(effective),
    })
}

pub fn horizon_label(step: usize, step_hours: u32) -> String {
    format!("{} hours ahead", step as u64 * u64::from(step_hours))
}
