pub mod aggregate;
pub mod config;
pub mod observability;
pub mod pipeline;
pub mod refresh;
pub mod selector;
pub mod sensor;
pub mod sinks;
pub mod sources;
pub mod transform;
pub mod tz;

pub use aggregate::{consume, fold_statistics, parse_series, read_series};
pub use pipeline::{Envelope, Pipeline, PipelineError};
pub use refresh::RefreshCycle;
pub use sensor::CsvHistorySensor;
