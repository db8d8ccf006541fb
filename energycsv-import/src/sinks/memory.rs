use std::collections::HashMap;

use energycsv_client::{StatisticMetadata, StatisticRecord, StatisticsStore};
use tokio::sync::Mutex;

/// Statistics kept in process memory, keyed by statistic id.
#[derive(Default)]
pub struct InMemoryStatisticsStore {
    inner: Mutex<HashMap<String, Stored>>,
}

#[derive(Default)]
struct Stored {
    metadata: Option<StatisticMetadata>,
    records: Vec<StatisticRecord>,
}

impl InMemoryStatisticsStore {
    pub async fn records(&self, statistic_id: &str) -> Vec<StatisticRecord> {
        self.inner
            .lock()
            .await
            .get(statistic_id)
            .map(|s| s.records.clone())
            .unwrap_or_default()
    }

    pub async fn metadata(&self, statistic_id: &str) -> Option<StatisticMetadata> {
        self.inner
            .lock()
            .await
            .get(statistic_id)
            .and_then(|s| s.metadata.clone())
    }
}

#[async_trait::async_trait]
impl StatisticsStore for InMemoryStatisticsStore {
    async fn latest(&self, statistic_id: &str) -> anyhow::Result<Option<StatisticRecord>> {
        Ok(self
            .inner
            .lock()
            .await
            .get(statistic_id)
            .and_then(|s| s.records.last().copied()))
    }

    async fn import(
        &self,
        metadata: &StatisticMetadata,
        records: &[StatisticRecord],
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        let stored = inner.entry(metadata.statistic_id.clone()).or_default();
        stored.metadata = Some(metadata.clone());
        stored.records.extend_from_slice(records);
        Ok(())
    }
}
