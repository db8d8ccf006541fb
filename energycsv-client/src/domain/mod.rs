mod meter_reading;
mod statistic;

pub use meter_reading::{HistoricalState, MeterReading, MeterSeries};
pub use statistic::{StatisticMetadata, StatisticRecord, KILO_WATT_HOUR};
