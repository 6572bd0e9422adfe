pub mod engine;
pub mod pipeline;
pub mod scheduler;

pub use crate::domain::model::{LocationRecord, RiskReport, RiskTable};
pub use crate::domain::ports::{KpFeed, LocationCatalog, Storage};
pub use crate::utils::error::Result;
