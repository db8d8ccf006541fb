use std::{
    fs::File,
    path::{Path, PathBuf},
};

use csv::StringRecord;
use energycsv_client::MeterReading;

use crate::{
    config::CsvColumns,
    pipeline::{Envelope, EnvelopeStream, PipelineError, Source},
    tz::LocalZone,
};

pub const DELIMITER: u8 = b';';

const BOM: char = '\u{feff}';

/// Semicolon-delimited meter export.
///
/// Expected header columns (names configurable through [`CsvColumns`]):
/// - Anlid (meter id)
/// - Datum (`YYYY-MM-DD HH:MM:SS`, wall-clock time in the configured zone)
/// - Förbrukn (consumption, decimal comma)
/// - Enhet (unit, informational)
pub struct MeterCsvFileSource {
    path: PathBuf,
    columns: CsvColumns,
    zone: LocalZone,
}

impl MeterCsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P, columns: CsvColumns, zone: LocalZone) -> Self {
        Self {
            path: path.into(),
            columns,
            zone,
        }
    }
}

/// Open `path` as a headed, semicolon-delimited CSV reader.
///
/// Rows may carry more fields than the header (a trailing `;`); the extra
/// fields are ignored. Short rows surface when a column is looked up.
pub fn open_reader(path: &Path) -> Result<csv::Reader<File>, PipelineError> {
    let file = File::open(path).map_err(|e| PipelineError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .flexible(true)
        .from_reader(file))
}

/// Position of `name` among `headers`, ignoring a leading byte-order mark.
pub fn header_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim_start_matches(BOM).trim() == name)
}

/// Parse a number written with a decimal comma (`"1,5"`).
pub fn parse_decimal_comma(s: &str) -> Option<f64> {
    s.trim().replace(',', ".").parse().ok()
}

struct ColumnIndex {
    meter_id: usize,
    timestamp: usize,
    value: usize,
    unit: usize,
}

impl ColumnIndex {
    fn resolve(headers: &StringRecord, columns: &CsvColumns) -> Result<Self, String> {
        let find = |name: &str| header_index(headers, name).ok_or_else(|| name.to_string());
        Ok(Self {
            meter_id: find(&columns.meter_id)?,
            timestamp: find(&columns.timestamp)?,
            value: find(&columns.value)?,
            unit: find(&columns.unit)?,
        })
    }
}

fn record_to_reading(
    record: &StringRecord,
    index: &ColumnIndex,
    zone: &LocalZone,
) -> Result<MeterReading, String> {
    let get = |idx: usize| record.get(idx).ok_or_else(|| "short record".to_string());

    let meter_id = get(index.meter_id)?.trim().to_string();

    let ts_str = get(index.timestamp)?;
    let timestamp = zone.parse_local(ts_str).map_err(|e| e.to_string())?;

    let value_str = get(index.value)?;
    let value = parse_decimal_comma(value_str).ok_or_else(|| format!("invalid value '{value_str}'"))?;

    let unit = get(index.unit)?.trim().to_string();

    Ok(MeterReading {
        meter_id,
        timestamp,
        value,
        unit,
    })
}

#[async_trait::async_trait]
impl Source<MeterReading> for MeterCsvFileSource {
    async fn stream(&self) -> EnvelopeStream<MeterReading> {
        // Blocking CSV reads wrapped in a single async stream; exports are small.
        let path = self.path.clone();
        let columns = self.columns.clone();
        let zone = self.zone;
        let s = async_stream::try_stream! {
            let mut rdr = open_reader(&path)?;
            let headers = rdr
                .headers()
                .map_err(|e| PipelineError::Read {
                    path: path.clone(),
                    reason: format!("failed to read CSV headers: {e}"),
                })?
                .clone();
            let index = ColumnIndex::resolve(&headers, &columns)
                .map_err(|column| PipelineError::MissingColumn { path: path.clone(), column })?;

            for (i, result) in rdr.records().enumerate() {
                let row = i as u64 + 1;
                let record = result.map_err(|e| PipelineError::MalformedRow {
                    path: path.clone(),
                    row,
                    reason: e.to_string(),
                })?;

                let reading = match record_to_reading(&record, &index, &zone) {
                    Ok(r) => r,
                    Err(reason) => {
                        metrics::counter!("energycsv_parse_errors_total").increment(1);
                        Err(PipelineError::MalformedRow { path: path.clone(), row, reason })?
                    }
                };

                yield Envelope { payload: reading, row };
            }
        };

        Box::pin(s)
    }
}
