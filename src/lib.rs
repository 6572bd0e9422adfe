pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::catalog::{CsvLocationCatalog, StaticLocationCatalog};
pub use adapters::noaa::NoaaKpFeed;
pub use adapters::report::ReportWriter;
pub use adapters::static_feed::StaticKpFeed;
pub use config::{cli::LocalStorage, toml_config::MonitorConfig};
pub use crate::core::engine::{MonitorEngine, MonitorSnapshot, RefreshOutcome, SkipReason};
pub use crate::core::pipeline::{PipelineSettings, RefreshPipeline, RiskPipeline};
pub use crate::core::scheduler::{RefreshPhase, RefreshScheduler, RefreshSnapshot};
pub use domain::model::{
    DisturbanceLevel, ForecastSequence, LocationRecord, RiskAssessment, RiskCategory, RiskReport,
    RiskTable, UnknownLevelPolicy,
};
pub use utils::error::{MonitorError, Result};
