use crate::domain::model::{CurrentReading, DisturbanceLevel, ForecastSequence};
use crate::domain::ports::KpFeed;
use crate::utils::error::{MonitorError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Fixed Kp values for offline runs and tests. Either feed can be set to fail.
pub struct StaticKpFeed {
    inner: Mutex<StaticFeedState>,
}

struct StaticFeedState {
    current: Option<CurrentReading>,
    forecast: Option<ForecastSequence>,
}

impl StaticKpFeed {
    pub fn new(level: DisturbanceLevel, observed_at: DateTime<Utc>, forecast: ForecastSequence) -> Self {
        Self {
            inner: Mutex::new(StaticFeedState {
                current: Some(CurrentReading { level, observed_at }),
                forecast: Some(forecast),
            }),
        }
    }

    /// Both feeds return an ingestion error.
    pub fn failing() -> Self {
        Self {
            inner: Mutex::new(StaticFeedState {
                current: None,
                forecast: None,
            }),
        }
    }

    pub fn set_current(&self, reading: Option<CurrentReading>) {
        if let Ok(mut state) = self.inner.lock() {
            state.current = reading;
        }
    }

    pub fn set_forecast(&self, forecast: Option<ForecastSequence>) {
        if let Ok(mut state) = self.inner.lock() {
            state.forecast = forecast;
        }
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, StaticFeedState>> {
        self.inner
            .lock()
            .map_err(|_| MonitorError::ingestion("static", "feed state poisoned"))
    }
}

#[async_trait]
impl KpFeed for StaticKpFeed {
    async fn fetch_current_level(&self) -> Result<CurrentReading> {
        self.state()?
            .current
            .clone()
            .ok_or_else(|| MonitorError::ingestion("static", "current level unavailable"))
    }

    async fn fetch_forecast_sequence(&self) -> Result<ForecastSequence> {
        self.state()?
            .forecast
            .clone()
            .ok_or_else(|| MonitorError::ingestion("static", "forecast unavailable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_feed_can_toggle_failure() {
        let now = Utc::now();
        let feed = StaticKpFeed::new(
            DisturbanceLevel::new(3.0).unwrap(),
            now,
            ForecastSequence::from_levels(&[4.0]).unwrap(),
        );
        assert_eq!(feed.fetch_current_level().await.unwrap().level.value(), 3.0);

        feed.set_current(None);
        assert!(feed.fetch_current_level().await.unwrap_err().is_ingestion_failure());
        assert_eq!(feed.fetch_forecast_sequence().await.unwrap().len(), 1);

        let failing = StaticKpFeed::failing();
        assert!(failing.fetch_forecast_sequence().await.is_err());
    }

    #[test]
    fn test_replacing_forecast() {
        let feed = StaticKpFeed::failing();
        feed.set_forecast(Some(ForecastSequence::from_levels(&[2.0, 5.0]).unwrap()));

        let forecast = tokio_test::block_on(feed.fetch_forecast_sequence()).unwrap();
        assert_eq!(forecast.levels(), vec![2.0, 5.0]);
        assert!(tokio_test::block_on(feed.fetch_current_level()).is_err());
    }
}
