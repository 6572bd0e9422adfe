use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn default_filter(verbose: bool, log_level: Option<&str>) -> EnvFilter {
    let directive = match (verbose, log_level) {
        (true, _) => "gps_risk_monitor=debug,info".to_string(),
        (false, Some(level)) => format!("gps_risk_monitor={}", level),
        (false, None) => "gps_risk_monitor=info".to_string(),
    };

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
}

pub fn init_cli_logger(verbose: bool, log_level: Option<&str>) {
    tracing_subscriber::registry()
        .with(default_filter(verbose, log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// 以 JSON 格式輸出 (給日誌收集器使用)
pub fn init_json_logger(log_level: Option<&str>) {
    tracing_subscriber::registry()
        .with(default_filter(false, log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .json(),
        )
        .init();
}
