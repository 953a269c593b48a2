//! Per-interval CSV row emission (§6.4), one row per worker thread per
//! sampling interval plus a final summary row.

use std::io::Write;

use perfcore_stats::ValueStatistics;
use serde::Serialize;

/// One CSV row: counters a worker carries change-since-last-sample for,
/// plus the latency distribution observed this interval. `extra_counters`
/// carries whatever change-deltas the calling bin wants to report (its
/// `ThreadStats`/`ProviderStats`/`NiStats` fields differ per tool), kept as
/// name/value pairs rather than forcing one fixed schema across all three.
#[derive(Debug, Clone, Serialize)]
pub struct IntervalRow {
    pub worker: String,
    pub elapsed_secs: f64,
    pub cpu_fraction: f64,
    pub rss_bytes: u64,
    pub latency_count: u64,
    pub latency_mean_usec: f64,
    pub latency_min_usec: f64,
    pub latency_max_usec: f64,
    pub latency_stddev_usec: f64,
    #[serde(flatten)]
    pub extra_counters: std::collections::BTreeMap<String, u64>,
}

impl IntervalRow {
    pub fn from_latency(
        worker: impl Into<String>,
        elapsed_secs: f64,
        cpu_fraction: f64,
        rss_bytes: u64,
        latency: &ValueStatistics,
        extra_counters: std::collections::BTreeMap<String, u64>,
    ) -> Self {
        let has_samples = latency.count() > 0;
        Self {
            worker: worker.into(),
            elapsed_secs,
            cpu_fraction,
            rss_bytes,
            latency_count: latency.count(),
            latency_mean_usec: if has_samples { latency.mean() } else { 0.0 },
            latency_min_usec: if has_samples { latency.min() } else { 0.0 },
            latency_max_usec: if has_samples { latency.max() } else { 0.0 },
            latency_stddev_usec: if has_samples { latency.stddev() } else { 0.0 },
            extra_counters,
        }
    }
}

/// Thin wrapper around `csv::Writer` that writes a header once and flushes
/// after every row, since this runs on a side thread and the rows need to
/// be durable as soon as they are written, not buffered until process exit.
pub struct CsvRowWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl<W: Write> CsvRowWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { inner: csv::WriterBuilder::new().has_headers(true).from_writer(sink) }
    }

    pub fn write_row(&mut self, row: &IntervalRow) -> Result<(), csv::Error> {
        self.inner.serialize(row)?;
        self.inner.flush().map_err(csv::Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_round_trips_through_csv() {
        let mut latency = ValueStatistics::default();
        latency.update(100.0);
        latency.update(200.0);
        let row = IntervalRow::from_latency("consumer-0", 1.5, 0.42, 4096, &latency, Default::default());

        let mut buf = Vec::new();
        {
            let mut w = CsvRowWriter::new(&mut buf);
            w.write_row(&row).unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("consumer-0"));
        assert!(text.contains("latency_mean_usec"));
    }

    #[test]
    fn extra_counters_are_flattened_into_named_columns() {
        let latency = ValueStatistics::default();
        let mut extra = std::collections::BTreeMap::new();
        extra.insert("refresh_count".to_string(), 7u64);
        let row = IntervalRow::from_latency("p-0", 0.0, 0.0, 0, &latency, extra);

        let mut buf = Vec::new();
        {
            let mut w = CsvRowWriter::new(&mut buf);
            w.write_row(&row).unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("refresh_count"));
        assert!(text.contains('7'));
    }
}
