use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One data row of a meter export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    pub meter_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub value: f64,
    /// Informational only; statistics are always reported in kWh.
    pub unit: String,
}

/// A `(state, dt)` pair as handed to the statistics host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalState {
    pub state: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub dt: OffsetDateTime,
}

impl From<&MeterReading> for HistoricalState {
    fn from(r: &MeterReading) -> Self {
        HistoricalState {
            state: r.value,
            dt: r.timestamp,
        }
    }
}

/// Readings of a single source file, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeterSeries {
    readings: Vec<MeterReading>,
}

impl MeterSeries {
    pub fn new(readings: Vec<MeterReading>) -> Self {
        Self { readings }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn readings(&self) -> &[MeterReading] {
        &self.readings
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MeterReading> {
        self.readings.iter()
    }

    /// Lazy view of the series as historical states.
    pub fn historical_states(&self) -> impl Iterator<Item = HistoricalState> + '_ {
        self.readings.iter().map(HistoricalState::from)
    }
}

impl From<Vec<MeterReading>> for MeterSeries {
    fn from(readings: Vec<MeterReading>) -> Self {
        Self::new(readings)
    }
}

impl IntoIterator for MeterSeries {
    type Item = MeterReading;
    type IntoIter = std::vec::IntoIter<MeterReading>;

    fn into_iter(self) -> Self::IntoIter {
        self.readings.into_iter()
    }
}

impl<'a> IntoIterator for &'a MeterSeries {
    type Item = &'a MeterReading;
    type IntoIter = std::slice::Iter<'a, MeterReading>;

    fn into_iter(self) -> Self::IntoIter {
        self.readings.iter()
    }
}
