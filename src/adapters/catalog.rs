use crate::domain::model::LocationRecord;
use crate::domain::ports::LocationCatalog;
use crate::utils::error::{MonitorError, Result};
use crate::utils::validation::is_http_url;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const NAME_COLUMNS: [&str; 2] = ["name", "city"];
const COUNTRY_COLUMNS: [&str; 1] = ["country"];
const LAT_COLUMNS: [&str; 2] = ["lat", "latitude"];
const LNG_COLUMNS: [&str; 3] = ["lng", "lon", "longitude"];

/// Location catalog backed by a CSV file on disk or served over http(s).
pub struct CsvLocationCatalog {
    source: String,
    max_locations: Option<usize>,
    client: Client,
    request_timeout: Duration,
}

impl CsvLocationCatalog {
    pub fn new(source: impl Into<String>, max_locations: Option<usize>) -> Self {
        Self {
            source: source.into(),
            max_locations,
            client: Client::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Per-request timeout for http(s) sources.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    async fn load_bytes(&self) -> Result<Vec<u8>> {
        if is_http_url(&self.source) {
            tracing::debug!("Downloading location catalog from: {}", self.source);
            let response = self
                .client
                .get(&self.source)
                .timeout(self.request_timeout)
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(MonitorError::CatalogError {
                    message: format!("HTTP {} from {}", response.status(), self.source),
                });
            }
            Ok(response.bytes().await?.to_vec())
        } else {
            tracing::debug!("Reading location catalog from: {}", self.source);
            Ok(tokio::fs::read(&self.source).await?)
        }
    }
}

#[async_trait]
impl LocationCatalog for CsvLocationCatalog {
    async fn list_locations(&self) -> Result<Vec<LocationRecord>> {
        let data = self.load_bytes().await?;
        let mut locations = parse_locations_csv(&data)?;
        if let Some(max) = self.max_locations {
            locations.truncate(max);
        }
        tracing::info!("🌍 Loaded {} locations from {}", locations.len(), self.source);
        Ok(locations)
    }
}

fn find_column(headers: &csv::StringRecord, aliases: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| aliases.iter().any(|alias| h.trim().eq_ignore_ascii_case(alias)))
}

fn require_column(headers: &csv::StringRecord, aliases: &[&str]) -> Result<usize> {
    find_column(headers, aliases).ok_or_else(|| MonitorError::CatalogError {
        message: format!("missing column (expected one of: {})", aliases.join(", ")),
    })
}

/// Rows with missing or out-of-range coordinates are skipped.
pub fn parse_locations_csv(data: &[u8]) -> Result<Vec<LocationRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    let name_idx = require_column(&headers, &NAME_COLUMNS)?;
    let lat_idx = require_column(&headers, &LAT_COLUMNS)?;
    let lng_idx = require_column(&headers, &LNG_COLUMNS)?;
    let country_idx = find_column(&headers, &COUNTRY_COLUMNS);

    let mut locations = Vec::new();
    let mut skipped = 0usize;

    for record in reader.records() {
        let record = record?;
        let name = record.get(name_idx).unwrap_or("");
        let latitude = record.get(lat_idx).and_then(|v| v.parse::<f64>().ok());
        let longitude = record.get(lng_idx).and_then(|v| v.parse::<f64>().ok());

        match (latitude, longitude) {
            (Some(lat), Some(lng))
                if !name.is_empty()
                    && (-90.0..=90.0).contains(&lat)
                    && (-180.0..=180.0).contains(&lng) =>
            {
                let mut location = LocationRecord::new(name, lat, lng);
                if let Some(country) = country_idx.and_then(|i| record.get(i)) {
                    if !country.is_empty() {
                        location = location.with_country(country);
                    }
                }
                locations.push(location);
            }
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!("⚠️ Skipped {} catalog rows with invalid name or coordinates", skipped);
    }
    Ok(locations)
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticLocationCatalog {
    locations: Vec<LocationRecord>,
}

impl StaticLocationCatalog {
    pub fn new(locations: Vec<LocationRecord>) -> Self {
        Self { locations }
    }
}

#[async_trait]
impl LocationCatalog for StaticLocationCatalog {
    async fn list_locations(&self) -> Result<Vec<LocationRecord>> {
        Ok(self.locations.clone())
    }
}
