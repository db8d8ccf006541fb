//! Capability traits a statistics host calls into.
//!
//! A sensor implements [`HistoricalDataProvider`] to produce the readings of a
//! refresh and [`StatisticsFolder`] to turn them into cumulative statistic
//! records. The host owns persistence through [`StatisticsStore`].

use crate::domain::{MeterSeries, StatisticMetadata, StatisticRecord};

#[async_trait::async_trait]
pub trait HistoricalDataProvider: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Produce the historical readings available for this refresh.
    async fn update_historical(&self) -> Result<MeterSeries, Self::Error>;

    /// Called after a successful [`update_historical`](Self::update_historical)
    /// and before the host stores anything. When this fails the host must
    /// not store the series.
    async fn consume(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

pub trait StatisticsFolder: Send + Sync {
    fn statistic_metadata(&self) -> StatisticMetadata;

    /// Fold `series` into statistic records, continuing from `latest` when the
    /// host already holds statistics for this sensor.
    fn calculate_statistic_data(
        &self,
        series: &MeterSeries,
        latest: Option<&StatisticRecord>,
    ) -> Vec<StatisticRecord>;
}

#[async_trait::async_trait]
pub trait StatisticsStore: Send + Sync {
    /// Most recent record held for `statistic_id`, if any.
    async fn latest(&self, statistic_id: &str) -> anyhow::Result<Option<StatisticRecord>>;

    async fn import(
        &self,
        metadata: &StatisticMetadata,
        records: &[StatisticRecord],
    ) -> anyhow::Result<()>;
}
