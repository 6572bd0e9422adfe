use crate::adapters::text_forecast::parse_forecast_text;
use crate::config::toml_config::{ForecastFormat, SourceConfig};
use crate::domain::model::{CurrentReading, DisturbanceLevel, ForecastSequence};
use crate::domain::ports::KpFeed;
use crate::utils::error::{MonitorError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;

const CURRENT_SOURCE: &str = "noaa-current";
const FORECAST_SOURCE: &str = "noaa-forecast";

const TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
];

/// NOAA SWPC planetary K-index feeds.
///
/// Both products are served either as an array of rows whose first row is the
/// header, or as an array of objects. Column names are matched case-insensitively.
pub struct NoaaKpFeed {
    client: Client,
    current_endpoint: String,
    forecast_endpoint: String,
    forecast_format: ForecastFormat,
    text_marker: String,
}

impl NoaaKpFeed {
    pub fn new(source: &SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(source.timeout_seconds))
            .user_agent(concat!("gps-risk-monitor/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            current_endpoint: source.current_endpoint.clone(),
            forecast_endpoint: source.forecast_endpoint.clone(),
            forecast_format: source.forecast_format,
            text_marker: source.text_marker.clone(),
        })
    }

    async fn get(&self, source_name: &str, endpoint: &str) -> Result<reqwest::Response> {
        tracing::debug!("Making API request to: {}", endpoint);
        let response = self.client.get(endpoint).send().await?;
        tracing::debug!("API response status: {}", response.status());

        if !response.status().is_success() {
            return Err(MonitorError::ingestion(
                source_name,
                format!("HTTP {} from {}", response.status(), endpoint),
            ));
        }
        Ok(response)
    }

    async fn get_json(&self, source_name: &str, endpoint: &str) -> Result<Value> {
        let body = self.get(source_name, endpoint).await?.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| MonitorError::ingestion(source_name, format!("invalid JSON: {}", e)))
    }
}

#[async_trait]
impl KpFeed for NoaaKpFeed {
    async fn fetch_current_level(&self) -> Result<CurrentReading> {
        let body = self.get_json(CURRENT_SOURCE, &self.current_endpoint).await?;
        parse_current_rows(&body)
    }

    async fn fetch_forecast_sequence(&self) -> Result<ForecastSequence> {
        match self.forecast_format {
            ForecastFormat::Json => {
                let body = self.get_json(FORECAST_SOURCE, &self.forecast_endpoint).await?;
                parse_forecast_rows(&body)
            }
            ForecastFormat::Text => {
                let body = self
                    .get(FORECAST_SOURCE, &self.forecast_endpoint)
                    .await?
                    .text()
                    .await?;
                Ok(parse_forecast_text(&body, &self.text_marker))
            }
        }
    }
}

/// 將兩種 NOAA 格式統一成以小寫欄位名為 key 的物件列表
fn normalize_rows(source_name: &str, body: &Value) -> Result<Vec<Map<String, Value>>> {
    let Value::Array(items) = body else {
        return Err(MonitorError::ingestion(source_name, "expected a JSON array"));
    };

    match items.first() {
        None => Ok(Vec::new()),
        Some(Value::Array(header)) => {
            let columns: Vec<String> = header
                .iter()
                .map(|h| h.as_str().map(str::to_lowercase))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| {
                    MonitorError::ingestion(source_name, "header row must contain column names")
                })?;

            Ok(items[1..]
                .iter()
                .filter_map(Value::as_array)
                .map(|row| {
                    columns
                        .iter()
                        .cloned()
                        .zip(row.iter().cloned())
                        .collect::<Map<String, Value>>()
                })
                .collect())
        }
        Some(Value::Object(_)) => Ok(items
            .iter()
            .filter_map(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .map(|(k, v)| (k.to_lowercase(), v.clone()))
                    .collect::<Map<String, Value>>()
            })
            .collect()),
        Some(_) => Err(MonitorError::ingestion(
            source_name,
            "rows must be arrays or objects",
        )),
    }
}

/// NOAA 的數值可能是字串或數字
fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn parse_time_tag(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn row_level(row: &Map<String, Value>) -> Option<DisturbanceLevel> {
    row.get("kp")
        .and_then(value_as_f64)
        .and_then(|kp| DisturbanceLevel::new(kp).ok())
}

fn row_time(row: &Map<String, Value>) -> Option<DateTime<Utc>> {
    row.get("time_tag")
        .and_then(Value::as_str)
        .and_then(parse_time_tag)
}

/// The most recent row with a usable Kp value and timestamp.
pub fn parse_current_rows(body: &Value) -> Result<CurrentReading> {
    let rows = normalize_rows(CURRENT_SOURCE, body)?;
    if rows.is_empty() {
        return Err(MonitorError::ingestion(CURRENT_SOURCE, "feed contains no rows"));
    }
    if !rows.iter().any(|row| row.contains_key("kp")) {
        return Err(MonitorError::ingestion(CURRENT_SOURCE, "missing 'Kp' column"));
    }

    rows.iter()
        .rev()
        .find_map(|row| {
            Some(CurrentReading {
                level: row_level(row)?,
                observed_at: row_time(row)?,
            })
        })
        .ok_or_else(|| MonitorError::ingestion(CURRENT_SOURCE, "no row has a valid Kp value"))
}

/// Predicted rows in feed order. Without an `observed` column every row is used.
pub fn parse_forecast_rows(body: &Value) -> Result<ForecastSequence> {
    let rows = normalize_rows(FORECAST_SOURCE, body)?;
    let has_observed = rows.iter().any(|row| row.contains_key("observed"));

    let mut points = Vec::new();
    let mut skipped = 0usize;
    for row in &rows {
        if has_observed {
            let predicted = row
                .get("observed")
                .and_then(Value::as_str)
                .map(|s| s.eq_ignore_ascii_case("predicted"))
                .unwrap_or(false);
            if !predicted {
                continue;
            }
        }
        match (row_time(row), row_level(row)) {
            (Some(time_tag), Some(level)) => points.push((time_tag, level)),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::debug!("Skipped {} malformed forecast rows", skipped);
    }
    Ok(ForecastSequence::from_timed(points))
}
