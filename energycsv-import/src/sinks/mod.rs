pub mod json_lines;
pub mod memory;

pub use json_lines::JsonLinesStatisticsStore;
pub use memory::InMemoryStatisticsStore;
