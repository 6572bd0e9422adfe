//! Latitude-banded GPS risk classification.
//!
//! The same Kp value is riskier near the poles, so each absolute-latitude band
//! carries its own pair of thresholds.

use crate::domain::model::{DisturbanceLevel, RiskCategory, UnknownLevelPolicy};
use crate::utils::error::{MonitorError, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LatitudeBand {
    /// |lat| >= 60
    High,
    /// 30 <= |lat| < 60
    Mid,
    /// |lat| < 30
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandThresholds {
    pub caution: f64,
    pub high_risk: f64,
}

impl LatitudeBand {
    pub fn from_latitude(latitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(MonitorError::contract(format!(
                "latitude must be finite and within [-90, 90], got {}",
                latitude
            )));
        }

        let abs_lat = latitude.abs();
        Ok(if abs_lat >= 60.0 {
            Self::High
        } else if abs_lat >= 30.0 {
            Self::Mid
        } else {
            Self::Low
        })
    }

    pub fn thresholds(self) -> BandThresholds {
        match self {
            Self::High => BandThresholds {
                caution: 2.0,
                high_risk: 4.0,
            },
            Self::Mid => BandThresholds {
                caution: 4.0,
                high_risk: 6.0,
            },
            Self::Low => BandThresholds {
                caution: 6.0,
                high_risk: 8.0,
            },
        }
    }
}

/// Classify with the default policy: an unknown level is reported as `Safe`.
pub fn classify(level: Option<DisturbanceLevel>, latitude: f64) -> Result<RiskCategory> {
    classify_with_policy(level, latitude, UnknownLevelPolicy::TreatAsSafe)
}

pub fn classify_with_policy(
    level: Option<DisturbanceLevel>,
    latitude: f64,
    policy: UnknownLevelPolicy,
) -> Result<RiskCategory> {
    // 緯度在 level 之前驗證，未知 level 也不能掩蓋錯誤的座標
    let thresholds = LatitudeBand::from_latitude(latitude)?.thresholds();

    let Some(level) = level else {
        return Ok(match policy {
            UnknownLevelPolicy::TreatAsSafe => RiskCategory::Safe,
            UnknownLevelPolicy::Surface => RiskCategory::Unknown,
        });
    };

    let kp = level.value();
    Ok(if kp >= thresholds.high_risk {
        RiskCategory::HighRisk
    } else if kp >= thresholds.caution {
        RiskCategory::Caution
    } else {
        RiskCategory::Safe
    })
}
