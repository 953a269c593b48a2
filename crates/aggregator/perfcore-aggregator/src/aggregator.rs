//! Stats aggregator (§4.11, §6.4): once per interval, samples process
//! resource usage, drains every worker's latency queue, folds it into the
//! running global distribution, writes one CSV row per worker, and at
//! shutdown prints a final summary.

use std::io::Write;

use perfcore_stats::{TimeRecord, ValueStatistics};

use crate::csv_writer::{CsvRowWriter, IntervalRow};
use crate::resource::{self, ResourceSnapshot};

/// What one worker hands the aggregator each interval: its name, the
/// change-since-last-sample value for whatever counters it wants reported,
/// and the batch of latency records drained from its `TimeRecordQueue`
/// since the previous call. Classification of a record as startup vs.
/// steady-state is the caller's job (only the consumer side has a warmup
/// boundary to classify against) — this type carries already-classified
/// batches so the aggregator stays ignorant of any one tool's session
/// model.
pub struct WorkerInterval {
    pub name: String,
    pub counters: std::collections::BTreeMap<String, u64>,
    pub startup_records: Vec<TimeRecord>,
    pub steady_records: Vec<TimeRecord>,
}

/// Running totals kept across the whole run, reported in the final
/// summary after every worker has stopped.
#[derive(Default)]
struct GlobalTotals {
    startup_latency: ValueStatistics,
    steady_latency: ValueStatistics,
    counters: std::collections::BTreeMap<String, u64>,
}

pub struct StatsAggregator<W: Write> {
    start_nanos: u64,
    prev_resource: ResourceSnapshot,
    csv: CsvRowWriter<W>,
    totals: GlobalTotals,
}

impl<W: Write> StatsAggregator<W> {
    pub fn new(csv_sink: W, start_nanos: u64) -> Self {
        Self {
            start_nanos,
            prev_resource: resource::sample(),
            csv: CsvRowWriter::new(csv_sink),
            totals: GlobalTotals::default(),
        }
    }

    /// Runs one sampling interval over every worker that reported in,
    /// writing one CSV row per worker and folding its records into the
    /// run-wide totals. Returns the number of rows written.
    pub fn sample_interval(
        &mut self,
        now_nanos: u64,
        workers: &[WorkerInterval],
    ) -> Result<usize, csv::Error> {
        let curr_resource = resource::sample();
        let cpu_fraction = resource::cpu_fraction(&self.prev_resource, &curr_resource);
        self.prev_resource = curr_resource;

        let elapsed_secs = now_nanos.saturating_sub(self.start_nanos) as f64 / 1_000_000_000.0;

        let mut rows_written = 0;
        for worker in workers {
            let mut latency = ValueStatistics::new();
            for record in &worker.startup_records {
                latency.update(record.latency_usec() as f64);
                self.totals.startup_latency.update(record.latency_usec() as f64);
            }
            for record in &worker.steady_records {
                latency.update(record.latency_usec() as f64);
                self.totals.steady_latency.update(record.latency_usec() as f64);
            }
            for (name, value) in &worker.counters {
                *self.totals.counters.entry(name.clone()).or_insert(0) += value;
            }

            let row = IntervalRow::from_latency(
                worker.name.clone(),
                elapsed_secs,
                cpu_fraction,
                curr_resource.rss_bytes,
                &latency,
                worker.counters.clone(),
            );
            self.csv.write_row(&row)?;
            rows_written += 1;
        }
        Ok(rows_written)
    }

    /// Writes the final summary row (startup distribution folded
    /// separately from steady-state, per §6.4) and returns it so the
    /// caller can also log it via `tracing`.
    pub fn finalize(&mut self, now_nanos: u64) -> Result<SummaryReport, csv::Error> {
        let elapsed_secs = now_nanos.saturating_sub(self.start_nanos) as f64 / 1_000_000_000.0;
        let curr_resource = resource::sample();

        let startup_row = IntervalRow::from_latency(
            "summary-startup",
            elapsed_secs,
            0.0,
            curr_resource.rss_bytes,
            &self.totals.startup_latency,
            self.totals.counters.clone(),
        );
        let steady_row = IntervalRow::from_latency(
            "summary-steady",
            elapsed_secs,
            0.0,
            curr_resource.rss_bytes,
            &self.totals.steady_latency,
            self.totals.counters.clone(),
        );
        self.csv.write_row(&startup_row)?;
        self.csv.write_row(&steady_row)?;

        Ok(SummaryReport {
            elapsed_secs,
            startup_latency: self.totals.startup_latency,
            steady_latency: self.totals.steady_latency,
            counters: self.totals.counters.clone(),
        })
    }
}

pub struct SummaryReport {
    pub elapsed_secs: f64,
    pub startup_latency: ValueStatistics,
    pub steady_latency: ValueStatistics,
    pub counters: std::collections::BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(usec: u64) -> TimeRecord {
        TimeRecord::new(0, usec * 1000, 1000)
    }

    #[test]
    fn sample_interval_writes_one_row_per_worker() {
        let mut buf = Vec::new();
        let mut agg = StatsAggregator::new(&mut buf, 0);
        let workers = vec![
            WorkerInterval {
                name: "consumer-0".into(),
                counters: Default::default(),
                startup_records: vec![record(100)],
                steady_records: vec![],
            },
            WorkerInterval {
                name: "consumer-1".into(),
                counters: Default::default(),
                startup_records: vec![],
                steady_records: vec![record(50), record(60)],
            },
        ];
        let rows = agg.sample_interval(1_000_000_000, &workers).unwrap();
        assert_eq!(rows, 2);
    }

    #[test]
    fn finalize_folds_all_intervals_into_one_summary() {
        let mut buf = Vec::new();
        let mut agg = StatsAggregator::new(&mut buf, 0);
        let workers = vec![WorkerInterval {
            name: "p-0".into(),
            counters: Default::default(),
            startup_records: vec![record(10)],
            steady_records: vec![record(20), record(30)],
        }];
        agg.sample_interval(500_000_000, &workers).unwrap();
        agg.sample_interval(1_000_000_000, &workers).unwrap();

        let summary = agg.finalize(1_500_000_000).unwrap();
        assert_eq!(summary.startup_latency.count(), 2);
        assert_eq!(summary.steady_latency.count(), 4);
    }

    #[test]
    fn counters_accumulate_across_intervals() {
        let mut buf = Vec::new();
        let mut agg = StatsAggregator::new(&mut buf, 0);
        let mut counters = std::collections::BTreeMap::new();
        counters.insert("refresh_count".to_string(), 3u64);
        let workers = vec![WorkerInterval {
            name: "c-0".into(),
            counters: counters.clone(),
            startup_records: vec![],
            steady_records: vec![],
        }];
        agg.sample_interval(100, &workers).unwrap();
        agg.sample_interval(200, &workers).unwrap();
        let summary = agg.finalize(300).unwrap();
        assert_eq!(summary.counters.get("refresh_count"), Some(&6));
    }
}
