use crate::domain::classifier::classify_with_policy;
use crate::domain::model::{
    DisturbanceLevel, LocationRecord, RiskAssessment, RiskTable, UnknownLevelPolicy,
};
use crate::utils::error::Result;

/// Classify every location against one level, preserving input order.
///
/// Duplicates are kept. An invalid latitude aborts the whole table.
pub fn build(
    level: Option<DisturbanceLevel>,
    locations: &[LocationRecord],
    policy: UnknownLevelPolicy,
) -> Result<RiskTable> {
    let rows = locations
        .iter()
        .map(|location| {
            let category = classify_with_policy(level, location.latitude, policy)?;
            Ok(RiskAssessment {
                location: location.clone(),
                level,
                category,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        "Built risk table with {} rows (level: {:?})",
        rows.len(),
        level.map(DisturbanceLevel::value)
    );

    Ok(RiskTable { level, rows })
}
