// Adapters layer: concrete implementations for external systems (feeds, catalogs, report output).

pub mod catalog;
pub mod noaa;
pub mod report;
pub mod static_feed;
pub mod text_forecast;
