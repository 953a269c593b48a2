//! Double-buffered latency time-record queue (§4.3).

use std::sync::Mutex;

/// One latency sample: a monotonic `start`/`end` tick pair plus the clock's
/// ticks-per-microsecond conversion factor, so the aggregator can turn the
/// delta into microseconds without re-deriving the clock's resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRecord {
    pub start: u64,
    pub end: u64,
    pub ticks_per_usec: u64,
}

impl TimeRecord {
    pub fn new(start: u64, end: u64, ticks_per_usec: u64) -> Self {
        Self { start, end, ticks_per_usec }
    }

    /// Latency in microseconds. Saturates to 0 rather than underflowing if
    /// `end < start`, which should never happen but must never panic a
    /// traffic thread.
    pub fn latency_usec(&self) -> u64 {
        self.end.saturating_sub(self.start) / self.ticks_per_usec.max(1)
    }
}

/// Mutex-protected queue that traffic threads push into and the stats
/// aggregator drains from, without the aggregator ever blocking a
/// latency-critical write.
///
/// Internally two `Vec`s behind one lock: `write` accumulates pushes,
/// `read` is the previously drained buffer now sitting idle and reusable.
/// `swap_and_read` swaps their roles under the lock and returns the old
/// write buffer (cleared before it becomes the next `read` buffer), so the
/// lock is only held for the swap itself, not for copying every record.
pub struct TimeRecordQueue {
    inner: Mutex<Inner>,
}

struct Inner {
    write: Vec<TimeRecord>,
    read: Vec<TimeRecord>,
}

impl Default for TimeRecordQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeRecordQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner { write: Vec::new(), read: Vec::new() }),
        }
    }

    /// Appends a record to the write buffer. Cheap and wait-free except for
    /// the mutex itself, which is held only long enough to push one element.
    pub fn push(&self, record: TimeRecord) {
        self.inner.lock().unwrap().write.push(record);
    }

    /// Swaps the write and read buffers and returns everything that had
    /// accumulated since the previous call, draining the queue exactly
    /// once per record (testable property 5).
    pub fn swap_and_read(&self) -> Vec<TimeRecord> {
        let mut inner = self.inner.lock().unwrap();
        inner.read.clear();
        std::mem::swap(&mut inner.write, &mut inner.read);
        std::mem::take(&mut inner.read)
    }
}
