//! Stats aggregator (C13): resource-usage sampling, cross-thread latency
//! merging, and CSV row emission, shared by all three perf tools.

mod aggregator;
mod csv_writer;
mod resource;

pub use aggregator::{StatsAggregator, SummaryReport, WorkerInterval};
pub use csv_writer::{CsvRowWriter, IntervalRow};
pub use resource::{cpu_fraction, sample, ResourceSnapshot};
