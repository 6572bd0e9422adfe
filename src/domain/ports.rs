use crate::domain::model::{CurrentReading, ForecastSequence, LocationRecord};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Upstream Kp provider.
#[async_trait]
pub trait KpFeed: Send + Sync {
    async fn fetch_current_level(&self) -> Result<CurrentReading>;

    /// An empty sequence is a valid result meaning "no forecast parsed".
    async fn fetch_forecast_sequence(&self) -> Result<ForecastSequence>;
}

#[async_trait]
pub trait LocationCatalog: Send + Sync {
    async fn list_locations(&self) -> Result<Vec<LocationRecord>>;
}
