use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Ingestion from {source_name} failed: {message}")]
    IngestionError {
        source_name: String,
        message: String,
    },

    #[error("{operation} timed out after {timeout_seconds}s")]
    TimeoutError {
        operation: String,
        timeout_seconds: u64,
    },

    #[error("Location catalog error: {message}")]
    CatalogError { message: String },

    #[error("Contract violation: {message}")]
    ContractViolation { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Configuration,
    Io,
    Programming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl MonitorError {
    pub fn ingestion(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IngestionError {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn contract(message: impl Into<String>) -> Self {
        Self::ContractViolation {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ApiError(_) | Self::TimeoutError { .. } => ErrorCategory::Network,
            Self::CsvError(_)
            | Self::SerializationError(_)
            | Self::IngestionError { .. }
            | Self::CatalogError { .. } => ErrorCategory::Data,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) => ErrorCategory::Io,
            Self::ContractViolation { .. } => ErrorCategory::Programming,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 上游資料問題會在下一次刷新時自動重試
            Self::ApiError(_) | Self::TimeoutError { .. } | Self::IngestionError { .. } => {
                ErrorSeverity::Medium
            }
            Self::CsvError(_) | Self::SerializationError(_) | Self::CatalogError { .. } => {
                ErrorSeverity::High
            }
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorSeverity::High,
            Self::IoError(_) | Self::ContractViolation { .. } => ErrorSeverity::Critical,
        }
    }

    /// 上游 feed 的失敗 (可降級處理，不應中止刷新)
    pub fn is_ingestion_failure(&self) -> bool {
        matches!(
            self,
            Self::ApiError(_) | Self::TimeoutError { .. } | Self::IngestionError { .. }
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::ApiError(_) => "Check network connectivity and the configured feed endpoints",
            Self::TimeoutError { .. } => {
                "The upstream feed is slow; increase source.timeout_seconds or wait for the next refresh"
            }
            Self::IngestionError { .. } => {
                "The upstream feed returned unexpected data; the next scheduled refresh will retry"
            }
            Self::CsvError(_) | Self::CatalogError { .. } => {
                "Check that the location catalog has name, lat and lng columns"
            }
            Self::SerializationError(_) => "Check the report output format settings",
            Self::IoError(_) => "Check file permissions and that the output path is writable",
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => {
                "Review the configuration file against the documented [monitor], [source], [catalog] and [output] sections"
            }
            Self::ContractViolation { .. } => {
                "This is a caller bug; check horizon steps and location latitudes"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::ApiError(_) | Self::TimeoutError { .. } | Self::IngestionError { .. } => {
                format!("Could not load Kp data: {}", self)
            }
            Self::CsvError(_) | Self::CatalogError { .. } => {
                format!("Could not load the location catalog: {}", self)
            }
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => format!("Invalid configuration: {}", self),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
