pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::config::toml_config::MonitorConfig;
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "gps-risk-monitor")]
#[command(about = "Geomagnetic Kp monitor producing per-location GPS risk tables")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "monitor.toml")]
    pub config: String,

    /// Run a single forced refresh and exit
    #[arg(long)]
    pub once: bool,

    /// Override the requested forecast step (1-based, 3h per step)
    #[arg(long)]
    pub horizon: Option<i64>,

    /// Override the refresh interval in seconds
    #[arg(long)]
    pub interval: Option<u64>,

    /// Override the location catalog (CSV path or URL)
    #[arg(long)]
    pub catalog: Option<String>,

    #[arg(long)]
    pub output_path: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per refresh cycle")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 將命令列參數覆蓋到檔案配置上
    pub fn apply_overrides(&self, config: &mut MonitorConfig) {
        if let Some(horizon) = self.horizon {
            tracing::info!("🔧 Forecast horizon step overridden to: {}", horizon);
            config.monitor.horizon_step = horizon;
        }
        if let Some(interval) = self.interval {
            tracing::info!("🔧 Refresh interval overridden to: {}s", interval);
            config.monitor.interval_seconds = interval;
        }
        if let Some(catalog) = &self.catalog {
            tracing::info!("🔧 Location catalog overridden to: {}", catalog);
            config.catalog.source = catalog.clone();
        }
        if let Some(output_path) = &self.output_path {
            config.output.output_path = output_path.clone();
        }
    }

    pub fn monitor_enabled(&self, config: &MonitorConfig) -> bool {
        self.monitor || config.monitoring_enabled()
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_file_config() {
        let cli = CliConfig::parse_from([
            "gps-risk-monitor",
            "--horizon",
            "4",
            "--interval",
            "60",
            "--catalog",
            "./capitals.csv",
            "--output-path",
            "./out",
        ]);
        let mut config = MonitorConfig::with_catalog("./cities.csv");
        cli.apply_overrides(&mut config);

        assert_eq!(config.monitor.horizon_step, 4);
        assert_eq!(config.monitor.interval_seconds, 60);
        assert_eq!(config.catalog.source, "./capitals.csv");
        assert_eq!(config.output.output_path, "./out");
        assert_eq!(cli.config, "monitor.toml");
        assert!(!cli.once);
    }

    #[test]
    fn test_cli_without_overrides_keeps_file_values() {
        let cli = CliConfig::parse_from(["gps-risk-monitor", "--once"]);
        let mut config = MonitorConfig::with_catalog("./cities.csv");
        cli.apply_overrides(&mut config);

        assert!(cli.once);
        assert_eq!(config.monitor.interval_seconds, 300);
        assert!(!cli.monitor_enabled(&config));
    }
}
