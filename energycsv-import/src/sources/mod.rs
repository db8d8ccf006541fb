pub mod meter_csv_file;

pub use meter_csv_file::MeterCsvFileSource;
