use anyhow::Result;
use chrono::Utc;
use gps_risk_monitor::adapters::report::{CURRENT_CSV, FORECAST_CSV, SNAPSHOT_JSON};
use gps_risk_monitor::utils::validation::Validate;
use gps_risk_monitor::{
    CsvLocationCatalog, LocalStorage, MonitorConfig, MonitorEngine, MonitorSnapshot,
    NoaaKpFeed, PipelineSettings, ReportWriter, RiskPipeline, UnknownLevelPolicy,
};
use httpmock::prelude::*;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

const CITIES_CSV: &str = "name,country,latitude,longitude\n\
Anchorage,United States,61.22,-149.90\n\
Toronto,Canada,43.65,-79.38\n\
Lima,Peru,-12.05,-77.04\n";

fn write_cities(temp_dir: &TempDir) -> Result<String> {
    let path = temp_dir.path().join("cities.csv");
    fs::write(&path, CITIES_CSV)?;
    Ok(path.to_string_lossy().to_string())
}

#[tokio::test]
async fn test_toml_config_drives_full_refresh() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let cities_path = write_cities(&temp_dir)?;
    let output_dir = temp_dir.path().join("output");

    // 模擬 NOAA 的兩個端點
    let server = MockServer::start_async().await;
    let current_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/kp.json");
            then.status(200).json_body(json!([
                ["time_tag", "Kp", "a_running", "station_count"],
                ["2024-05-10 21:00:00.000", "5.00", "48", "8"]
            ]));
        })
        .await;
    let forecast_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/forecast.json");
            then.status(200).json_body(json!([
                ["time_tag", "kp", "observed", "noaa_scale"],
                ["2024-05-10 21:00:00", "5.00", "estimated", "G1"],
                ["2024-05-11 00:00:00", "6.67", "predicted", "G2"],
                ["2024-05-11 03:00:00", "8.00", "predicted", "G4"]
            ]));
        })
        .await;

    let toml_content = format!(
        r#"
[monitor]
name = "integration"
interval_seconds = 120
horizon_step = 2

[source]
current_endpoint = "{}"
forecast_endpoint = "{}"
timeout_seconds = 5

[catalog]
source = "{}"

[output]
output_path = "{}"
formats = ["csv", "json"]
"#,
        server.url("/kp.json"),
        server.url("/forecast.json"),
        cities_path.replace('\\', "/"),
        output_dir.to_string_lossy().replace('\\', "/")
    );
    let config_path = temp_dir.path().join("monitor.toml");
    fs::write(&config_path, toml_content)?;

    let config = MonitorConfig::from_file(&config_path)?;
    config.validate()?;
    assert_eq!(config.monitor.interval_seconds, 120);

    let feed = NoaaKpFeed::new(&config.source)?;
    let catalog =
        CsvLocationCatalog::new(&config.catalog.source, config.catalog.max_locations);
    let pipeline = RiskPipeline::new(feed, catalog, PipelineSettings::from_config(&config));
    let engine = MonitorEngine::new(pipeline, config.monitor.interval_seconds, Utc::now())?;

    let outcome = engine.force_refresh(Utc::now()).await?;
    assert_eq!(outcome.label(), "refreshed");
    current_mock.assert_async().await;
    forecast_mock.assert_async().await;

    let snapshot = engine.snapshot(Utc::now()).await?.expect("report after refresh");
    assert_eq!(snapshot.report.forecast_label, "6 hours ahead");
    assert_eq!(snapshot.refresh.interval_seconds, 120);

    let writer = ReportWriter::new(
        LocalStorage::new(&config.output.output_path),
        &config.output.formats,
    );
    let written = writer.write(&snapshot).await?;
    assert_eq!(written, vec![CURRENT_CSV, FORECAST_CSV, SNAPSHOT_JSON]);

    let current_csv = fs::read_to_string(output_dir.join(CURRENT_CSV))?;
    let lines: Vec<&str> = current_csv.lines().collect();
    assert_eq!(lines[0], "name,country,latitude,longitude,kp,category");
    assert_eq!(lines[1], "Anchorage,United States,61.22,-149.9,5,HighRisk");
    assert_eq!(lines[2], "Toronto,Canada,43.65,-79.38,5,Caution");
    assert_eq!(lines[3], "Lima,Peru,-12.05,-77.04,5,Safe");

    let forecast_csv = fs::read_to_string(output_dir.join(FORECAST_CSV))?;
    assert!(forecast_csv.contains("Lima,Peru,-12.05,-77.04,8,HighRisk"));

    // JSON 快照可以完整讀回
    let json_data = fs::read(output_dir.join(SNAPSHOT_JSON))?;
    let restored: MonitorSnapshot = serde_json::from_slice(&json_data)?;
    assert_eq!(restored.report.current_table.len(), 3);
    assert_eq!(restored.report.forecast_label, snapshot.report.forecast_label);
    assert_eq!(restored.refresh.next_refresh_at, snapshot.refresh.next_refresh_at);
    assert!(restored.report.issues.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_unreachable_feed_with_surface_policy_writes_unknown_rows() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let cities_path = write_cities(&temp_dir)?;

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(502);
        })
        .await;

    let mut config = MonitorConfig::with_catalog(cities_path);
    config.source.current_endpoint = server.url("/kp.json");
    config.source.forecast_endpoint = server.url("/forecast.json");
    config.monitor.unknown_level_policy = UnknownLevelPolicy::Surface;
    config.output.output_path = temp_dir.path().join("out").to_string_lossy().to_string();
    config.output.formats = vec!["csv".to_string()];
    config.validate()?;

    let pipeline = RiskPipeline::new(
        NoaaKpFeed::new(&config.source)?,
        CsvLocationCatalog::new(&config.catalog.source, None),
        PipelineSettings::from_config(&config),
    );
    let engine = MonitorEngine::new(pipeline, config.monitor.interval_seconds, Utc::now())?;

    let outcome = engine.force_refresh(Utc::now()).await?;
    assert_eq!(outcome.label(), "degraded");
    let report = outcome.report().expect("degraded report");
    assert_eq!(report.issues.len(), 2);
    assert_eq!(report.forecast_label, "Unavailable");

    let snapshot = engine.snapshot(Utc::now()).await?.expect("degraded report is kept");
    let writer = ReportWriter::new(
        LocalStorage::new(&config.output.output_path),
        &config.output.formats,
    );
    let written = writer.write(&snapshot).await?;
    assert_eq!(written, vec![CURRENT_CSV, FORECAST_CSV]);

    let out_dir = temp_dir.path().join("out");
    let current_csv = fs::read_to_string(out_dir.join(CURRENT_CSV))?;
    assert!(current_csv
        .lines()
        .skip(1)
        .all(|line| line.ends_with(",,Unknown")));
    assert!(!out_dir.join(SNAPSHOT_JSON).exists());

    Ok(())
}

#[tokio::test]
async fn test_failed_report_write_keeps_monitor_running() -> Result<()> {
    use gps_risk_monitor::{DisturbanceLevel, ForecastSequence, StaticKpFeed};

    let temp_dir = TempDir::new()?;
    let cities_path = write_cities(&temp_dir)?;

    // 輸出路徑是一個檔案, 無法建立目錄
    let blocked = temp_dir.path().join("blocked");
    fs::write(&blocked, "not a directory")?;

    let now = Utc::now();
    let feed = StaticKpFeed::new(
        DisturbanceLevel::new(6.0)?,
        now,
        ForecastSequence::from_levels(&[7.0])?,
    );
    let pipeline = RiskPipeline::new(
        feed,
        CsvLocationCatalog::new(cities_path, None),
        PipelineSettings::default(),
    );
    let engine = MonitorEngine::new(pipeline, 60, now)?;
    assert_eq!(engine.tick(now).await?.label(), "refreshed");

    let snapshot = engine.snapshot(now).await?.expect("report after refresh");
    let formats = vec!["csv".to_string(), "json".to_string()];
    let broken = ReportWriter::new(LocalStorage::new(&blocked), &formats);
    assert!(broken.write(&snapshot).await.is_err());
    assert!(broken.write_or_log(&snapshot).await.is_none());

    // 排程照常進行, 下一次刷新後可以寫到正常的目錄
    let later = now + chrono::Duration::seconds(60);
    assert_eq!(engine.tick(later).await?.label(), "refreshed");

    let out_dir = temp_dir.path().join("out");
    let writer = ReportWriter::new(LocalStorage::new(&out_dir), &formats);
    let snapshot = engine.snapshot(later).await?.expect("report after second refresh");
    let written = writer.write_or_log(&snapshot).await.expect("writable output");
    assert_eq!(written.len(), 3);
    assert!(out_dir.join(CURRENT_CSV).exists());

    Ok(())
}
