use crate::core::engine::MonitorSnapshot;
use crate::domain::model::RiskTable;
use crate::domain::ports::Storage;
use crate::utils::error::{MonitorError, Result};

pub const CURRENT_CSV: &str = "current_risk.csv";
pub const FORECAST_CSV: &str = "forecast_risk.csv";
pub const SNAPSHOT_JSON: &str = "snapshot.json";

const CSV_HEADER: [&str; 6] = ["name", "country", "latitude", "longitude", "kp", "category"];

/// Persists each refresh cycle's tables for the presentation layer.
pub struct ReportWriter<S: Storage> {
    storage: S,
    write_csv: bool,
    write_json: bool,
}

impl<S: Storage> ReportWriter<S> {
    pub fn new(storage: S, formats: &[String]) -> Self {
        Self {
            storage,
            write_csv: formats.iter().any(|f| f == "csv"),
            write_json: formats.iter().any(|f| f == "json"),
        }
    }

    /// Returns the names of the files written.
    pub async fn write(&self, snapshot: &MonitorSnapshot) -> Result<Vec<String>> {
        let mut written = Vec::new();

        if self.write_csv {
            let report = &snapshot.report;
            self.storage
                .write_file(CURRENT_CSV, &table_to_csv(&report.current_table)?)
                .await?;
            written.push(CURRENT_CSV.to_string());

            self.storage
                .write_file(FORECAST_CSV, &table_to_csv(&report.forecast_table)?)
                .await?;
            written.push(FORECAST_CSV.to_string());
        }

        if self.write_json {
            let json_data = serde_json::to_vec_pretty(snapshot)?;
            self.storage.write_file(SNAPSHOT_JSON, &json_data).await?;
            written.push(SNAPSHOT_JSON.to_string());
        }

        tracing::debug!("Wrote report files: {:?}", written);
        Ok(written)
    }

    /// Like `write`, but a failed write is logged and reported as `None` so a
    /// long-running monitor keeps its refresh schedule.
    pub async fn write_or_log(&self, snapshot: &MonitorSnapshot) -> Option<Vec<String>> {
        match self.write(snapshot).await {
            Ok(written) => Some(written),
            Err(e) => {
                tracing::error!(
                    "❌ Failed to write report: {} (Category: {:?}, Severity: {:?})",
                    e,
                    e.category(),
                    e.severity()
                );
                tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
                None
            }
        }
    }
}

pub fn table_to_csv(table: &RiskTable) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    let kp = table
        .level
        .map(|level| level.value().to_string())
        .unwrap_or_default();

    for row in &table.rows {
        let latitude = row.location.latitude.to_string();
        let longitude = row.location.longitude.to_string();
        writer.write_record([
            row.location.name.as_str(),
            row.location.country.as_deref().unwrap_or(""),
            latitude.as_str(),
            longitude.as_str(),
            kp.as_str(),
            row.category.as_str(),
        ])?;
    }

    writer.into_inner().map_err(|e| MonitorError::IoError(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{DisturbanceLevel, LocationRecord, UnknownLevelPolicy};
    use crate::domain::table::build;

    #[test]
    fn test_table_to_csv() {
        let locations = vec![
            LocationRecord::new("Fairbanks", 64.84, -147.72).with_country("United States"),
            LocationRecord::new("Lagos", 6.52, 3.38),
        ];
        let table = build(
            Some(DisturbanceLevel::new(4.0).unwrap()),
            &locations,
            UnknownLevelPolicy::TreatAsSafe,
        )
        .unwrap();

        let csv = String::from_utf8(table_to_csv(&table).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "name,country,latitude,longitude,kp,category");
        assert_eq!(lines[1], "Fairbanks,United States,64.84,-147.72,4,HighRisk");
        assert_eq!(lines[2], "Lagos,,6.52,3.38,4,Safe");
    }

    #[test]
    fn test_unknown_level_leaves_kp_blank() {
        let table = build(
            None,
            &[LocationRecord::new("Lagos", 6.52, 3.38)],
            UnknownLevelPolicy::Surface,
        )
        .unwrap();
        let csv = String::from_utf8(table_to_csv(&table).unwrap()).unwrap();
        assert_eq!(csv.lines().nth(1), Some("Lagos,,6.52,3.38,,Unknown"));
    }
}
