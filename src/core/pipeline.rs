use crate::config::toml_config::MonitorConfig;
use crate::domain::forecast::select;
use crate::domain::model::{
    CurrentReading, ForecastSequence, IngestionIssue, LocationRecord, RiskReport,
    UnknownLevelPolicy,
};
use crate::domain::ports::{KpFeed, LocationCatalog};
use crate::domain::table::build;
use crate::utils::error::{MonitorError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tokio::sync::OnceCell;

/// One refresh cycle: ingest, resolve the forecast horizon, build both tables.
#[async_trait]
pub trait RefreshPipeline: Send + Sync {
    async fn run(&self, now: DateTime<Utc>) -> Result<RiskReport>;
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub horizon_step: i64,
    pub step_hours: u32,
    pub timeout: Duration,
    pub unknown_level_policy: UnknownLevelPolicy,
}

impl PipelineSettings {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            horizon_step: config.monitor.horizon_step,
            step_hours: config.monitor.step_hours,
            timeout: Duration::from_secs(config.source.timeout_seconds),
            unknown_level_policy: config.monitor.unknown_level_policy,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            horizon_step: 1,
            step_hours: crate::domain::forecast::DEFAULT_STEP_HOURS,
            timeout: Duration::from_secs(10),
            unknown_level_policy: UnknownLevelPolicy::TreatAsSafe,
        }
    }
}

pub struct RiskPipeline<F: KpFeed, C: LocationCatalog> {
    feed: F,
    catalog: C,
    settings: PipelineSettings,
    locations: OnceCell<Vec<LocationRecord>>,
}

impl<F: KpFeed, C: LocationCatalog> RiskPipeline<F, C> {
    pub fn new(feed: F, catalog: C, settings: PipelineSettings) -> Self {
        Self {
            feed,
            catalog,
            settings,
            locations: OnceCell::new(),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    /// 地點目錄只在第一次成功載入後快取; 載入同樣受 timeout 限制
    async fn locations(&self) -> Result<&[LocationRecord]> {
        let locations = self
            .locations
            .get_or_try_init(|| {
                self.with_timeout("list_locations", self.catalog.list_locations())
            })
            .await?;
        Ok(locations.as_slice())
    }

    async fn with_timeout<T, Fut>(&self, operation: &str, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>> + Send,
    {
        match tokio::time::timeout(self.settings.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(MonitorError::TimeoutError {
                operation: operation.to_string(),
                timeout_seconds: self.settings.timeout.as_secs(),
            }),
        }
    }

    async fn ingest_current(&self, issues: &mut Vec<IngestionIssue>) -> Option<CurrentReading> {
        match self
            .with_timeout("fetch_current_level", self.feed.fetch_current_level())
            .await
        {
            Ok(reading) => {
                tracing::debug!("Current Kp {} observed at {}", reading.level, reading.observed_at);
                Some(reading)
            }
            Err(e) => {
                tracing::warn!("⚠️ Could not load current Kp, level is unknown: {}", e);
                issues.push(IngestionIssue::CurrentLevel(e.to_string()));
                None
            }
        }
    }

    async fn ingest_forecast(&self, issues: &mut Vec<IngestionIssue>) -> ForecastSequence {
        match self
            .with_timeout("fetch_forecast_sequence", self.feed.fetch_forecast_sequence())
            .await
        {
            Ok(sequence) if sequence.is_empty() => {
                tracing::warn!("⚠️ Kp forecast feed returned no values");
                issues.push(IngestionIssue::ForecastEmpty(
                    "forecast feed returned no values".to_string(),
                ));
                sequence
            }
            Ok(sequence) => {
                tracing::debug!("Loaded {} forecast steps", sequence.len());
                sequence
            }
            Err(e) => {
                tracing::warn!("⚠️ Could not load Kp forecast, using fallback: {}", e);
                issues.push(IngestionIssue::Forecast(e.to_string()));
                ForecastSequence::empty()
            }
        }
    }
}

#[async_trait]
impl<F: KpFeed, C: LocationCatalog> RefreshPipeline for RiskPipeline<F, C> {
    async fn run(&self, now: DateTime<Utc>) -> Result<RiskReport> {
        let locations = self.locations().await?;

        let mut issues = Vec::new();
        let current = self.ingest_current(&mut issues).await;
        let forecast = self.ingest_forecast(&mut issues).await;

        let current_level = current.as_ref().map(|r| r.level);
        let selection = select(
            &forecast,
            self.settings.horizon_step,
            current_level,
            self.settings.step_hours,
        )?;

        let policy = self.settings.unknown_level_policy;
        let current_table = build(current_level, locations, policy)?;
        let forecast_table = build(selection.level, locations, policy)?;

        tracing::debug!(
            "Refresh cycle built {} rows per table (forecast: {})",
            locations.len(),
            selection.label
        );

        Ok(RiskReport {
            generated_at: now,
            current_level,
            observed_at: current.map(|r| r.observed_at),
            forecast_level: selection.level,
            forecast_label: selection.label,
            forecast_step: selection.effective_step,
            forecast,
            current_table,
            forecast_table,
            issues,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::catalog::StaticLocationCatalog;
    use crate::adapters::static_feed::StaticKpFeed;
    use crate::domain::model::{DisturbanceLevel, RiskCategory};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn locations() -> Vec<LocationRecord> {
        vec![
            LocationRecord::new("Murmansk", 68.97, 33.09),
            LocationRecord::new("Madrid", 40.42, -3.70),
            LocationRecord::new("Bogotá", 4.71, -74.07),
        ]
    }

    fn feed(current: f64, forecast: &[f64]) -> StaticKpFeed {
        StaticKpFeed::new(
            DisturbanceLevel::new(current).unwrap(),
            Utc::now(),
            ForecastSequence::from_levels(forecast).unwrap(),
        )
    }

    fn settings(horizon_step: i64) -> PipelineSettings {
        PipelineSettings {
            horizon_step,
            ..PipelineSettings::default()
        }
    }

    #[tokio::test]
    async fn test_run_builds_current_and_forecast_tables() {
        let pipeline = RiskPipeline::new(
            feed(3.0, &[4.0, 6.0, 8.0]),
            StaticLocationCatalog::new(locations()),
            settings(2),
        );

        let report = pipeline.run(Utc::now()).await.unwrap();
        assert!(!report.is_degraded());
        assert_eq!(report.current_level.map(|l| l.value()), Some(3.0));
        assert_eq!(report.forecast_level.map(|l| l.value()), Some(6.0));
        assert_eq!(report.forecast_label, "6 hours ahead");
        assert_eq!(report.forecast_step, Some(2));

        let current: Vec<RiskCategory> =
            report.current_table.rows.iter().map(|r| r.category).collect();
        assert_eq!(
            current,
            vec![RiskCategory::Caution, RiskCategory::Safe, RiskCategory::Safe]
        );
        let forecast: Vec<RiskCategory> =
            report.forecast_table.rows.iter().map(|r| r.category).collect();
        assert_eq!(
            forecast,
            vec![RiskCategory::HighRisk, RiskCategory::HighRisk, RiskCategory::Caution]
        );
    }

    #[tokio::test]
    async fn test_forecast_failure_falls_back_to_current_level() {
        let feed = feed(5.0, &[]);
        feed.set_forecast(None);
        let pipeline = RiskPipeline::new(feed, StaticLocationCatalog::new(locations()), settings(3));

        let report = pipeline.run(Utc::now()).await.unwrap();
        assert!(report.is_degraded());
        assert!(matches!(report.issues[0], IngestionIssue::Forecast(_)));
        assert_eq!(report.forecast_label, "Unavailable");
        assert_eq!(report.forecast_level, report.current_level);
        assert_eq!(report.forecast_step, None);
    }

    #[tokio::test]
    async fn test_empty_forecast_is_recorded() {
        let pipeline = RiskPipeline::new(
            feed(2.0, &[]),
            StaticLocationCatalog::new(locations()),
            settings(1),
        );
        let report = pipeline.run(Utc::now()).await.unwrap();
        assert_eq!(report.issues.len(), 1);
        assert!(matches!(report.issues[0], IngestionIssue::ForecastEmpty(_)));
    }

    #[tokio::test]
    async fn test_all_ingestion_failing_still_produces_report() {
        let pipeline = RiskPipeline::new(
            StaticKpFeed::failing(),
            StaticLocationCatalog::new(locations()),
            settings(1),
        );
        let report = pipeline.run(Utc::now()).await.unwrap();
        assert_eq!(report.issues.len(), 2);
        assert_eq!(report.current_level, None);
        assert_eq!(report.forecast_level, None);
        assert!(report
            .current_table
            .rows
            .iter()
            .all(|r| r.category == RiskCategory::Safe));
    }

    #[tokio::test]
    async fn test_invalid_horizon_is_contract_violation() {
        let pipeline = RiskPipeline::new(
            feed(2.0, &[1.0]),
            StaticLocationCatalog::new(locations()),
            settings(0),
        );
        assert!(matches!(
            pipeline.run(Utc::now()).await,
            Err(MonitorError::ContractViolation { .. })
        ));
    }

    struct SlowFeed;

    #[async_trait]
    impl KpFeed for SlowFeed {
        async fn fetch_current_level(&self) -> Result<CurrentReading> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(MonitorError::ingestion("slow", "unreachable"))
        }

        async fn fetch_forecast_sequence(&self) -> Result<ForecastSequence> {
            Ok(ForecastSequence::from_levels(&[7.0]).unwrap())
        }
    }

    #[tokio::test]
    async fn test_timeout_counts_as_ingestion_failure() {
        let pipeline = RiskPipeline::new(
            SlowFeed,
            StaticLocationCatalog::new(locations()),
            PipelineSettings {
                timeout: Duration::from_millis(20),
                ..PipelineSettings::default()
            },
        );

        let report = pipeline.run(Utc::now()).await.unwrap();
        assert_eq!(report.current_level, None);
        match &report.issues[0] {
            IngestionIssue::CurrentLevel(message) => assert!(message.contains("timed out")),
            other => panic!("unexpected issue: {:?}", other),
        }
        assert_eq!(report.forecast_level.map(|l| l.value()), Some(7.0));
    }

    struct CountingCatalog {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LocationCatalog for CountingCatalog {
        async fn list_locations(&self) -> Result<Vec<LocationRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(locations())
        }
    }

    #[tokio::test]
    async fn test_catalog_is_loaded_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = RiskPipeline::new(
            feed(1.0, &[1.0]),
            CountingCatalog {
                calls: calls.clone(),
            },
            settings(1),
        );

        pipeline.run(Utc::now()).await.unwrap();
        pipeline.run(Utc::now()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct HangingCatalog;

    #[async_trait]
    impl LocationCatalog for HangingCatalog {
        async fn list_locations(&self) -> Result<Vec<LocationRecord>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(locations())
        }
    }

    #[tokio::test]
    async fn test_hanging_catalog_times_out() {
        let pipeline = RiskPipeline::new(
            feed(3.0, &[4.0]),
            HangingCatalog,
            PipelineSettings {
                timeout: Duration::from_millis(50),
                ..PipelineSettings::default()
            },
        );

        let result = tokio::time::timeout(Duration::from_secs(2), pipeline.run(Utc::now()))
            .await
            .expect("run must finish within the catalog timeout");
        match result {
            Err(MonitorError::TimeoutError { operation, .. }) => {
                assert_eq!(operation, "list_locations")
            }
            other => panic!("expected catalog timeout, got {:?}", other),
        }
    }
}
