use std::path::{Path, PathBuf};

use energycsv_client::{
    HistoricalDataProvider, MeterSeries, StatisticMetadata, StatisticRecord, StatisticsFolder,
};

use crate::{
    aggregate::{consume, fold_statistics, read_series},
    config::{CsvColumns, ImportConfig, IntegrationConfig},
    pipeline::PipelineError,
    selector::ConfigEntry,
    tz::{LocalZone, ZoneError},
};

/// Names under which a meter's sensor is registered with the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorIdentity {
    pub unique_id: String,
    pub entity_id: String,
    pub name: String,
}

impl SensorIdentity {
    pub fn new(domain: &str, meter_id: &str) -> Self {
        Self {
            unique_id: format!("{meter_id}_energy"),
            entity_id: format!("sensor.{domain}_{meter_id}"),
            name: format!("{meter_id} Energy Usage"),
        }
    }
}

/// Historical energy sensor fed from one CSV export.
pub struct CsvHistorySensor {
    meter_id: String,
    filename: PathBuf,
    identity: SensorIdentity,
    columns: CsvColumns,
    zone: LocalZone,
}

impl CsvHistorySensor {
    pub fn new(
        meter_id: impl Into<String>,
        filename: impl Into<PathBuf>,
        integration: &IntegrationConfig,
        import: &ImportConfig,
    ) -> Result<Self, ZoneError> {
        let meter_id = meter_id.into();
        Ok(Self {
            identity: SensorIdentity::new(&integration.domain, &meter_id),
            meter_id,
            filename: filename.into(),
            columns: import.columns.clone(),
            zone: import.local_zone()?,
        })
    }

    pub fn from_entry(
        entry: &ConfigEntry,
        integration: &IntegrationConfig,
        import: &ImportConfig,
    ) -> Result<Self, ZoneError> {
        Self::new(&entry.title, &entry.data.filename, integration, import)
    }

    pub fn meter_id(&self) -> &str {
        &self.meter_id
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn identity(&self) -> &SensorIdentity {
        &self.identity
    }
}

#[async_trait::async_trait]
impl HistoricalDataProvider for CsvHistorySensor {
    type Error = PipelineError;

    async fn update_historical(&self) -> Result<MeterSeries, PipelineError> {
        Ok(read_series(&self.filename, &self.columns, self.zone)
            .await?
            .unwrap_or_default())
    }

    async fn consume(&self) -> Result<(), PipelineError> {
        consume(&self.filename)
            .await
            .map(|_| ())
            .map_err(|e| PipelineError::Consume {
                path: self.filename.clone(),
                reason: e.to_string(),
            })
    }
}

impl StatisticsFolder for CsvHistorySensor {
    fn statistic_metadata(&self) -> StatisticMetadata {
        StatisticMetadata::energy_sum(&self.identity.entity_id, Some(self.identity.name.clone()))
    }

    fn calculate_statistic_data(
        &self,
        series: &MeterSeries,
        latest: Option<&StatisticRecord>,
    ) -> Vec<StatisticRecord> {
        let prior = latest.map(|r| r.cumulative_sum).unwrap_or(0.0);
        tracing::info!(meter_id = %self.meter_id, prior, readings = series.len(), "calculating statistics data");
        fold_statistics(series, prior)
    }
}
