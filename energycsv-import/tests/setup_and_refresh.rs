use std::{fs, sync::Arc, time::Duration};

use energycsv_import::{
    config::AppConfig,
    refresh::RefreshCycle,
    selector::{ConfigFlow, FlowResult},
    sensor::CsvHistorySensor,
    sinks::JsonLinesStatisticsStore,
};
use energycsv_client::StatisticsStore;

const EXPORT: &str = "\u{feff}Anlid;Datum;Förbrukn;Enhet\n\
735999;2024-10-27 01:00:00;0,75;kWh\n\
735999;2024-10-27 02:00:00;1,25;kWh\n\
735999;2024-10-27 03:00:00;1,0;kWh\n";

#[tokio::test]
async fn wizard_entry_feeds_statistics_store() {
    let dir = tempfile::tempdir().unwrap();
    let exports = dir.path().join("exports");
    fs::create_dir(&exports).unwrap();
    let export = exports.join("735999.csv");
    fs::write(&export, EXPORT).unwrap();

    let cfg = AppConfig::from_toml_str(&format!(
        "[store]\ndirectory = \"{}\"\n",
        dir.path().join("stats").display()
    ))
    .unwrap();

    let mut flow = ConfigFlow::new(
        cfg.integration.clone(),
        cfg.selector.clone(),
        cfg.import.columns.meter_id.clone(),
    );
    let choices = match flow.step_user(Some(&exports.display().to_string())) {
        FlowResult::ShowForm(form) => form.choices,
        other => panic!("expected file form, got {other:?}"),
    };
    assert_eq!(choices, vec![export.clone()]);

    let entry = match flow.step_choose_file(Some(&export.display().to_string())) {
        FlowResult::CreateEntry(entry) => entry,
        other => panic!("expected entry, got {other:?}"),
    };
    assert_eq!(entry.title, "735999");

    let sensor = CsvHistorySensor::from_entry(&entry, &cfg.integration, &cfg.import).unwrap();
    let store = Arc::new(JsonLinesStatisticsStore::new(&cfg.store.directory));
    let cycle = RefreshCycle::new(sensor, store.clone(), Duration::from_secs(3600));

    assert_eq!(cycle.refresh_once().await.unwrap(), 3);
    assert!(!export.exists());
    assert_eq!(cycle.refresh_once().await.unwrap(), 0);

    let latest = store
        .latest("sensor.energycsv_735999")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.cumulative_sum, 3.0);
    assert_eq!(latest.period_value, 1.0);

    // The ambiguous 02:00 wall time resolves to the earlier (summer time) instant.
    let lines = fs::read_to_string(store.records_path("sensor.energycsv_735999")).unwrap();
    assert_eq!(lines.lines().count(), 3);
    assert!(lines.lines().nth(1).unwrap().contains("2024-10-27T02:00:00+02:00"));
}
