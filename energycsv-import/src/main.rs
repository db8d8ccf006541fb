use anyhow::{bail, Result};
use energycsv_import::{
    config::AppConfig,
    observability,
    refresh::RefreshCycle,
    sensor::CsvHistorySensor,
    sinks::JsonLinesStatisticsStore,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;
    if cfg.entries.is_empty() {
        bail!("no entries configured; run setup_entry to create one");
    }

    let store = Arc::new(JsonLinesStatisticsStore::new(&cfg.store.directory));
    let interval = cfg.import.update_interval();
    let cancel = CancellationToken::new();

    // One refresh loop per configured meter.
    let mut handles = Vec::with_capacity(cfg.entries.len());
    for entry in &cfg.entries {
        let sensor = CsvHistorySensor::from_entry(entry, &cfg.integration, &cfg.import)?;
        tracing::info!(
            entity_id = %sensor.identity().entity_id,
            file = %sensor.filename().display(),
            ?interval,
            "starting refresh loop"
        );
        let cycle = RefreshCycle::new(sensor, store.clone(), interval);
        handles.push(tokio::spawn(cycle.run(cancel.clone())));
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    cancel.cancel();

    for handle in handles {
        handle.await?;
    }

    Ok(())
}
