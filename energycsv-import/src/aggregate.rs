//! CSV export → meter series → cumulative statistics.
//!
//! [`read_series`] only reads; [`consume`] removes the export; [`parse_series`]
//! composes the two so a file yields its series exactly once. Removal happens
//! after every row was accepted, so a failed or cancelled read leaves the file
//! in place for the next refresh.

use std::{io, path::Path, sync::Arc};

use energycsv_client::{MeterSeries, StatisticRecord};

use crate::{
    config::CsvColumns,
    pipeline::{Pipeline, PipelineError},
    sources::MeterCsvFileSource,
    transform::ReadingValidation,
    tz::LocalZone,
};

/// Read every row of `path` into a series.
///
/// Returns `Ok(None)` when the file does not exist, which is the normal state
/// after a previous refresh consumed it.
pub async fn read_series(
    path: &Path,
    columns: &CsvColumns,
    zone: LocalZone,
) -> Result<Option<MeterSeries>, PipelineError> {
    match tokio::fs::try_exists(path).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::info!(path = %path.display(), "file does not exist, most likely already consumed");
            return Ok(None);
        }
        Err(e) => {
            return Err(PipelineError::Read {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    }

    let pipeline = Pipeline {
        source: MeterCsvFileSource::new(path, columns.clone(), zone),
        transforms: vec![Arc::new(ReadingValidation)],
    };
    let readings = pipeline.collect().await?;

    tracing::debug!(path = %path.display(), rows = readings.len(), "read meter series");
    Ok(Some(MeterSeries::new(readings)))
}

/// Remove a consumed export. Returns `false` if it was already gone.
pub async fn consume(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            metrics::counter!("energycsv_files_consumed_total").increment(1);
            tracing::info!(path = %path.display(), "removed consumed file");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Read `path` and remove it once every row was accepted.
///
/// A missing file yields an empty series. On error the file is kept.
pub async fn parse_series(
    path: &Path,
    columns: &CsvColumns,
    zone: LocalZone,
) -> Result<MeterSeries, PipelineError> {
    let Some(series) = read_series(path, columns, zone).await? else {
        return Ok(MeterSeries::empty());
    };

    consume(path).await.map_err(|e| PipelineError::Consume {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(series)
}

/// Left fold of `series` into statistic records continuing from `prior_cumulative`.
pub fn fold_statistics(series: &MeterSeries, prior_cumulative: f64) -> Vec<StatisticRecord> {
    series
        .iter()
        .scan(prior_cumulative, |accumulated, reading| {
            *accumulated += reading.value;
            Some(StatisticRecord {
                period_start: reading.timestamp,
                period_value: reading.value,
                mean: reading.value,
                cumulative_sum: *accumulated,
            })
        })
        .collect()
}
