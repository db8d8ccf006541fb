pub mod domain;
pub mod host;

pub use domain::{HistoricalState, MeterReading, MeterSeries, StatisticMetadata, StatisticRecord};
pub use host::{HistoricalDataProvider, StatisticsFolder, StatisticsStore};
