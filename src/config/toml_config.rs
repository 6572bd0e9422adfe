use crate::core::scheduler::MAX_INTERVAL_SECONDS;
use crate::domain::forecast::DEFAULT_STEP_HOURS;
use crate::domain::model::UnknownLevelPolicy;
use crate::utils::error::{MonitorError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CURRENT_ENDPOINT: &str =
    "https://services.swpc.noaa.gov/products/noaa-planetary-k-index.json";
pub const DEFAULT_FORECAST_ENDPOINT: &str =
    "https://services.swpc.noaa.gov/products/noaa-planetary-k-index-forecast.json";

const VALID_OUTPUT_FORMATS: [&str; 2] = ["csv", "json"];
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub monitor: MonitorSection,
    #[serde(default)]
    pub source: SourceConfig,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSection {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default = "default_horizon_step")]
    pub horizon_step: i64,
    #[serde(default = "default_step_hours")]
    pub step_hours: u32,
    #[serde(default)]
    pub unknown_level_policy: UnknownLevelPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_current_endpoint")]
    pub current_endpoint: String,
    #[serde(default = "default_forecast_endpoint")]
    pub forecast_endpoint: String,
    #[serde(default)]
    pub forecast_format: ForecastFormat,
    #[serde(default = "default_text_marker")]
    pub text_marker: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// 本地 CSV 路徑或 http(s) URL
    pub source: String,
    pub max_locations: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub output_path: String,
    #[serde(default = "default_output_formats")]
    pub formats: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
    pub json_logs: Option<bool>,
}

fn default_name() -> String {
    "gps-risk".to_string()
}

fn default_interval_seconds() -> u64 {
    300
}

fn default_horizon_step() -> i64 {
    1
}

fn default_step_hours() -> u32 {
    DEFAULT_STEP_HOURS
}

fn default_current_endpoint() -> String {
    DEFAULT_CURRENT_ENDPOINT.to_string()
}

fn default_forecast_endpoint() -> String {
    DEFAULT_FORECAST_ENDPOINT.to_string()
}

fn default_text_marker() -> String {
    "Kp".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_output_path() -> String {
    "./output".to_string()
}

fn default_output_formats() -> Vec<String> {
    vec!["csv".to_string(), "json".to_string()]
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            interval_seconds: default_interval_seconds(),
            horizon_step: default_horizon_step(),
            step_hours: default_step_hours(),
            unknown_level_policy: UnknownLevelPolicy::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            current_endpoint: default_current_endpoint(),
            forecast_endpoint: default_forecast_endpoint(),
            forecast_format: ForecastFormat::default(),
            text_marker: default_text_marker(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            formats: default_output_formats(),
        }
    }
}

impl MonitorConfig {
    /// 以預設值建立配置 (只需要地點目錄來源)
    pub fn with_catalog(source: impl Into<String>) -> Self {
        Self {
            monitor: MonitorSection::default(),
            source: SourceConfig::default(),
            catalog: CatalogConfig {
                source: source.into(),
                max_locations: None,
            },
            output: OutputConfig::default(),
            monitoring: None,
        }
    }

    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(MonitorError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| MonitorError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${CATALOG_URL})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| MonitorError::ConfigError {
            message: format!("Invalid env substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("monitor.name", &self.monitor.name)?;
        validation::validate_range(
            "monitor.interval_seconds",
            self.monitor.interval_seconds,
            1,
            MAX_INTERVAL_SECONDS as u64,
        )?;
        validation::validate_positive_number("monitor.horizon_step", self.monitor.horizon_step, 1)?;
        validation::validate_positive_number("monitor.step_hours", self.monitor.step_hours, 1)?;

        validation::validate_url("source.current_endpoint", &self.source.current_endpoint)?;
        validation::validate_url("source.forecast_endpoint", &self.source.forecast_endpoint)?;
        if self.source.forecast_format == ForecastFormat::Text {
            validation::validate_non_empty_string("source.text_marker", &self.source.text_marker)?;
        }
        validation::validate_range("source.timeout_seconds", self.source.timeout_seconds, 1, 300)?;

        if validation::is_http_url(&self.catalog.source) {
            validation::validate_url("catalog.source", &self.catalog.source)?;
        } else {
            validation::validate_path("catalog.source", &self.catalog.source)?;
            validation::validate_file_extensions(
                "catalog.source",
                std::slice::from_ref(&self.catalog.source),
                &["csv"],
            )?;
        }
        if let Some(max) = self.catalog.max_locations {
            validation::validate_positive_number("catalog.max_locations", max, 1)?;
        }

        validation::validate_path("output.output_path", &self.output.output_path)?;
        for format in &self.output.formats {
            validation::validate_one_of("output.formats", format, &VALID_OUTPUT_FORMATS)?;
        }

        if let Some(level) = self.monitoring.as_ref().and_then(|m| m.log_level.as_deref()) {
            validation::validate_one_of("monitoring.log_level", level, &VALID_LOG_LEVELS)?;
        }

        Ok(())
    }

    pub fn forecast_format_name(&self) -> &'static str {
        match self.source.forecast_format {
            ForecastFormat::Json => "json",
            ForecastFormat::Text => "text",
        }
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.monitoring.as_ref().and_then(|m| m.log_level.as_deref())
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.json_logs)
            .unwrap_or(false)
    }

    pub fn writes_format(&self, format: &str) -> bool {
        self.output.formats.iter().any(|f| f == format)
    }
}

impl Validate for MonitorConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
