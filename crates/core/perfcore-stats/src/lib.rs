//! Online statistics and the mutex-protected latency record queue shared by
//! every traffic thread and the stats aggregator.
//!
//! - [`ValueStatistics`]: Welford-style running mean/variance/min/max.
//! - [`CountStat`]: monotonic counter with "change since last read" delta.
//! - [`TimeRecordQueue`]: double-buffered queue of `(start, end, ticks_per_usec)`.

mod count_stat;
mod time_record;
mod value_stats;

pub use count_stat::CountStat;
pub use time_record::{TimeRecord, TimeRecordQueue};
pub use value_stats::{StatsError, ValueStatistics};
