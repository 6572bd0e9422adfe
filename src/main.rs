use chrono::Utc;
use clap::Parser;
use gps_risk_monitor::core::engine::{MonitorEngine, RefreshOutcome};
use gps_risk_monitor::core::pipeline::{PipelineSettings, RefreshPipeline, RiskPipeline};
use gps_risk_monitor::utils::error::{ErrorSeverity, MonitorError};
use gps_risk_monitor::utils::monitor::CycleMonitor;
use gps_risk_monitor::utils::{logger, validation::Validate};
use gps_risk_monitor::{
    CliConfig, CsvLocationCatalog, LocalStorage, MonitorConfig, MonitorSnapshot, NoaaKpFeed,
    ReportWriter,
};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};

const COUNTDOWN_LOG_EVERY: u64 = 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliConfig::parse();

    // 載入 TOML 配置
    let mut config = match MonitorConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if config.json_logs() {
        logger::init_json_logger(config.log_level());
    } else {
        logger::init_cli_logger(args.verbose, config.log_level());
    }

    tracing::info!("🚀 Starting gps-risk-monitor");
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    // 應用命令列覆蓋設定
    args.apply_overrides(&mut config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }
    if args.verbose {
        tracing::debug!("Monitor config: {:?}", config);
    }

    let monitor = CycleMonitor::new(args.monitor_enabled(&config));
    if monitor.is_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }

    match run(&args, &config, &monitor).await {
        Ok(()) => {
            monitor.log_final_stats();
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                "❌ Monitor stopped: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(exit_code(e.severity()));
        }
    }
}

fn exit_code(severity: ErrorSeverity) -> i32 {
    match severity {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

async fn run(
    args: &CliConfig,
    config: &MonitorConfig,
    monitor: &CycleMonitor,
) -> Result<(), MonitorError> {
    let feed = NoaaKpFeed::new(&config.source)?;
    let catalog = CsvLocationCatalog::new(&config.catalog.source, config.catalog.max_locations)
        .with_timeout(Duration::from_secs(config.source.timeout_seconds));
    let pipeline = RiskPipeline::new(feed, catalog, PipelineSettings::from_config(config));
    let engine = MonitorEngine::new(pipeline, config.monitor.interval_seconds, Utc::now())?;

    let storage = LocalStorage::new(&config.output.output_path);
    let writer = ReportWriter::new(storage, &config.output.formats);

    tracing::info!(
        "📡 Monitor '{}': refresh every {}s, forecast step {} ({} feed)",
        config.monitor.name,
        config.monitor.interval_seconds,
        config.monitor.horizon_step,
        config.forecast_format_name()
    );

    if args.once {
        let started = Instant::now();
        let outcome = engine.force_refresh(Utc::now()).await?;
        monitor.record_cycle(outcome.label(), started.elapsed());
        publish(&engine, &writer, config).await?;
        if let RefreshOutcome::Failed { message, severity } = outcome {
            tracing::error!("❌ Refresh failed: {}", message);
            eprintln!("❌ Refresh failed: {}", message);
            std::process::exit(exit_code(severity));
        }
        return Ok(());
    }

    tracing::info!("⌨️ Press Enter to refresh now, Ctrl+C to stop");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("🛑 Shutting down");
                return Ok(());
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(_)) => {
                        tracing::info!("🔧 Manual refresh requested");
                        let started = Instant::now();
                        let outcome = engine.force_refresh(Utc::now()).await?;
                        if outcome.ran() {
                            monitor.record_cycle(outcome.label(), started.elapsed());
                            publish_in_loop(&engine, &writer, config).await;
                        }
                    }
                    Ok(None) | Err(_) => stdin_open = false,
                }
            }
            _ = ticker.tick() => {
                let now = Utc::now();
                let started = Instant::now();
                let outcome = engine.tick(now).await?;
                if outcome.ran() {
                    monitor.record_cycle(outcome.label(), started.elapsed());
                    publish_in_loop(&engine, &writer, config).await;
                } else {
                    let remaining = engine.seconds_remaining(now)?;
                    if remaining % COUNTDOWN_LOG_EVERY == 0 && remaining > 0 {
                        tracing::info!("⏳ Next refresh in {}s", remaining);
                    }
                }
            }
        }
    }
}

/// `--once`: a failed write is returned so the process exits with its severity.
async fn publish<P: RefreshPipeline>(
    engine: &MonitorEngine<P>,
    writer: &ReportWriter<LocalStorage>,
    config: &MonitorConfig,
) -> Result<(), MonitorError> {
    let Some(snapshot) = engine.snapshot(Utc::now()).await? else {
        tracing::warn!("⚠️ No report available yet, nothing to write");
        return Ok(());
    };

    log_summary(&snapshot);
    let written = writer.write(&snapshot).await?;
    log_written(&written, config);
    Ok(())
}

/// Interactive loop: write problems are logged and the schedule keeps running.
async fn publish_in_loop<P: RefreshPipeline>(
    engine: &MonitorEngine<P>,
    writer: &ReportWriter<LocalStorage>,
    config: &MonitorConfig,
) {
    let snapshot = match engine.snapshot(Utc::now()).await {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            tracing::warn!("⚠️ No report available yet, nothing to write");
            return;
        }
        Err(e) => {
            tracing::error!("❌ Could not read monitor snapshot: {}", e);
            return;
        }
    };

    log_summary(&snapshot);
    if let Some(written) = writer.write_or_log(&snapshot).await {
        log_written(&written, config);
    }
}

fn log_summary(snapshot: &MonitorSnapshot) {
    let current = snapshot.report.current_table.summary();
    let forecast = snapshot.report.forecast_table.summary();
    tracing::info!(
        "🗺️ Current: {} safe / {} caution / {} high risk; {}: {} safe / {} caution / {} high risk",
        current.safe,
        current.caution,
        current.high_risk,
        snapshot.report.forecast_label,
        forecast.safe,
        forecast.caution,
        forecast.high_risk
    );
}

fn log_written(written: &[String], config: &MonitorConfig) {
    tracing::info!(
        "📁 Wrote {} file(s) to {}",
        written.len(),
        config.output.output_path
    );
}
