use std::{sync::Arc, time::Duration};

use energycsv_client::{HistoricalDataProvider, StatisticsFolder, StatisticsStore};
use futures::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;

#[derive(thiserror::Error, Debug)]
pub enum RefreshError {
    #[error("historical update failed: {0}")]
    Provider(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("consuming the source failed: {0}")]
    Consume(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("statistics store failed: {0:#}")]
    Store(anyhow::Error),
}

/// Periodic import of one sensor's readings into a statistics store.
pub struct RefreshCycle<P, S> {
    sensor: P,
    store: Arc<S>,
    interval: Duration,
}

impl<P, S> RefreshCycle<P, S>
where
    P: HistoricalDataProvider + StatisticsFolder + 'static,
    S: StatisticsStore + 'static,
{
    pub fn new(sensor: P, store: Arc<S>, interval: Duration) -> Self {
        Self {
            sensor,
            store,
            interval,
        }
    }

    /// Read, consume, fold and store one batch. Returns the number of records
    /// stored.
    ///
    /// Nothing is stored unless the provider consumed its source, so a source
    /// that cannot be removed is never imported twice.
    pub async fn refresh_once(&self) -> Result<usize, RefreshError> {
        let series = self
            .sensor
            .update_historical()
            .await
            .map_err(|e| RefreshError::Provider(Box::new(e)))?;
        self.sensor
            .consume()
            .await
            .map_err(|e| RefreshError::Consume(Box::new(e)))?;
        if series.is_empty() {
            return Ok(0);
        }

        let metadata = self.sensor.statistic_metadata();
        let latest = self
            .store
            .latest(&metadata.statistic_id)
            .await
            .map_err(RefreshError::Store)?;
        let records = self.sensor.calculate_statistic_data(&series, latest.as_ref());

        self.store
            .import(&metadata, &records)
            .await
            .map_err(RefreshError::Store)?;
        metrics::counter!("energycsv_statistics_imported_total").increment(records.len() as u64);

        Ok(records.len())
    }

    /// Refresh immediately, then every interval, until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticks = IntervalStream::new(tokio::time::interval(self.interval));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                tick = ticks.next() => {
                    if tick.is_none() {
                        break;
                    }
                    match self.refresh_once().await {
                        Ok(0) => tracing::debug!("no new readings"),
                        Ok(n) => tracing::info!(records = n, "imported statistics"),
                        Err(e) => {
                            metrics::counter!("energycsv_refresh_failures_total").increment(1);
                            tracing::error!(error = %e, "refresh failed");
                        }
                    }
                }
            }
        }

        tracing::info!("refresh loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{ImportConfig, IntegrationConfig},
        pipeline::PipelineError,
        sensor::CsvHistorySensor,
        sinks::InMemoryStatisticsStore,
    };
    use energycsv_client::{MeterSeries, StatisticMetadata, StatisticRecord};
    use std::{fs, path::Path};

    const HEADER: &str = "Anlid;Datum;Förbrukn;Enhet";

    fn sensor(path: &Path) -> CsvHistorySensor {
        CsvHistorySensor::new(
            "12345",
            path,
            &IntegrationConfig::default(),
            &ImportConfig::default(),
        )
        .unwrap()
    }

    fn cycle(
        path: &Path,
        store: Arc<InMemoryStatisticsStore>,
    ) -> RefreshCycle<CsvHistorySensor, InMemoryStatisticsStore> {
        RefreshCycle::new(sensor(path), store, Duration::from_millis(10))
    }

    /// Reads like the CSV sensor but can never remove its file.
    struct UndeletableSensor(CsvHistorySensor);

    #[async_trait::async_trait]
    impl HistoricalDataProvider for UndeletableSensor {
        type Error = PipelineError;

        async fn update_historical(&self) -> Result<MeterSeries, PipelineError> {
            self.0.update_historical().await
        }

        async fn consume(&self) -> Result<(), PipelineError> {
            Err(PipelineError::Consume {
                path: self.0.filename().to_path_buf(),
                reason: "permission denied".to_string(),
            })
        }
    }

    impl StatisticsFolder for UndeletableSensor {
        fn statistic_metadata(&self) -> StatisticMetadata {
            self.0.statistic_metadata()
        }

        fn calculate_statistic_data(
            &self,
            series: &MeterSeries,
            latest: Option<&StatisticRecord>,
        ) -> Vec<StatisticRecord> {
            self.0.calculate_statistic_data(series, latest)
        }
    }

    #[tokio::test]
    async fn refresh_carries_sum_across_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.csv");
        let store = Arc::new(InMemoryStatisticsStore::default());
        let c = cycle(&path, store.clone());

        fs::write(
            &path,
            format!("{HEADER}\n12345;2024-01-01 00:00:00;1,5;kWh\n12345;2024-01-01 01:00:00;2,0;kWh\n"),
        )
        .unwrap();
        assert_eq!(c.refresh_once().await.unwrap(), 2);
        assert!(!path.exists());

        // Already consumed: nothing to do.
        assert_eq!(c.refresh_once().await.unwrap(), 0);

        fs::write(&path, format!("{HEADER}\n12345;2024-01-01 02:00:00;0,5;kWh\n")).unwrap();
        assert_eq!(c.refresh_once().await.unwrap(), 1);

        let sums: Vec<f64> = store
            .records("sensor.energycsv_12345")
            .await
            .iter()
            .map(|r| r.cumulative_sum)
            .collect();
        assert_eq!(sums, vec![1.5, 3.5, 4.0]);
    }

    #[tokio::test]
    async fn failed_parse_keeps_file_and_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.csv");
        let store = Arc::new(InMemoryStatisticsStore::default());
        let c = cycle(&path, store.clone());

        fs::write(&path, format!("{HEADER}\n12345;2024-01-01 00:00:00;abc;kWh\n")).unwrap();
        assert!(matches!(c.refresh_once().await, Err(RefreshError::Provider(_))));
        assert!(path.exists());
        assert!(store.records("sensor.energycsv_12345").await.is_empty());
    }

    #[tokio::test]
    async fn undeletable_file_is_never_imported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.csv");
        fs::write(&path, format!("{HEADER}\n12345;2024-01-01 00:00:00;1,5;kWh\n")).unwrap();
        let store = Arc::new(InMemoryStatisticsStore::default());
        let c = RefreshCycle::new(
            UndeletableSensor(sensor(&path)),
            store.clone(),
            Duration::from_millis(10),
        );

        for _ in 0..3 {
            assert!(matches!(c.refresh_once().await, Err(RefreshError::Consume(_))));
        }
        assert!(path.exists());
        assert!(store.records("sensor.energycsv_12345").await.is_empty());
    }

    #[test]
    fn consume_failure_is_named_in_the_message() {
        let err = RefreshError::Consume(Box::new(PipelineError::Consume {
            path: "m.csv".into(),
            reason: "permission denied".to_string(),
        }));
        assert!(err.to_string().starts_with("consuming the source failed"));
    }

    #[tokio::test]
    async fn header_only_file_is_consumed_without_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.csv");
        let store = Arc::new(InMemoryStatisticsStore::default());
        let c = cycle(&path, store.clone());

        fs::write(&path, format!("{HEADER}\n")).unwrap();
        assert_eq!(c.refresh_once().await.unwrap(), 0);
        assert!(!path.exists());
        assert!(store.records("sensor.energycsv_12345").await.is_empty());
    }

    #[tokio::test]
    async fn run_refreshes_until_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.csv");
        fs::write(&path, format!("{HEADER}\n12345;2024-01-01 00:00:00;1,0;kWh\n")).unwrap();
        let store = Arc::new(InMemoryStatisticsStore::default());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(cycle(&path, store.clone()).run(cancel.clone()));
        for _ in 0..100 {
            if !path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cancel.cancel();
        handle.await.unwrap();

        assert!(!path.exists());
        assert_eq!(store.records("sensor.energycsv_12345").await.len(), 1);
    }
}
