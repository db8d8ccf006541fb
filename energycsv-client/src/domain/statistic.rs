use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const KILO_WATT_HOUR: &str = "kWh";

/// Statistics source used by the recorder for sensor-provided data.
const RECORDER_SOURCE: &str = "recorder";

/// One period of long-term statistics.
///
/// Readings arrive already aggregated per period, so `period_value` doubles
/// as both the period delta and the period `mean`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticRecord {
    #[serde(with = "time::serde::rfc3339")]
    pub period_start: OffsetDateTime,
    pub period_value: f64,
    pub mean: f64,
    pub cumulative_sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticMetadata {
    pub statistic_id: String,
    pub name: Option<String>,
    pub source: String,
    pub unit_of_measurement: String,
    pub has_sum: bool,
    pub has_mean: bool,
}

impl StatisticMetadata {
    /// Metadata for a cumulative energy statistic in kWh.
    pub fn energy_sum(statistic_id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            statistic_id: statistic_id.into(),
            name,
            source: RECORDER_SOURCE.to_string(),
            unit_of_measurement: KILO_WATT_HOUR.to_string(),
            has_sum: true,
            has_mean: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_sum_metadata_reports_kwh_with_sum() {
        let meta = StatisticMetadata::energy_sum("sensor.energycsv_735999", None);
        assert_eq!(meta.unit_of_measurement, "kWh");
        assert!(meta.has_sum);
        assert!(!meta.has_mean);
        assert_eq!(meta.source, "recorder");
    }
}
