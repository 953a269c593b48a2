//! Shared per-tick burst-size helper (§4.8), used by the consumer,
//! interactive-provider, and non-interactive-provider schedulers so the
//! `base + remainder` math and latency sub-index selection are written once.

use perfcore_clock::burst_size;

/// The number of messages a scheduler should send on one tick for a single
/// sub-rate (request, update, post, or generic), and which of those
/// messages (if any) should carry a latency stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstPlan {
    pub count: u32,
    /// Sub-index within this burst that should carry a stamp, or `None` if
    /// none should.
    pub latency_sub_index: Option<u32>,
}

impl BurstPlan {
    /// `rate` messages per second distributed across `ticks_per_sec` ticks,
    /// on tick `current_tick`. `latency_index` is the value returned by the
    /// relevant latency-random-array's `next()` (or `ALWAYS`, represented
    /// here by passing `Some(..)` directly already resolved by the caller).
    pub fn for_tick(
        rate: u32,
        ticks_per_sec: u32,
        current_tick: u32,
        latency_index: Option<i32>,
    ) -> Self {
        let count = burst_size(rate, ticks_per_sec, current_tick);
        let latency_sub_index = latency_index.and_then(|idx| {
            if idx >= 0 && (idx as u32) < count { Some(idx as u32) } else { None }
        });
        Self { count, latency_sub_index }
    }

    /// Whether the message at `sub_index` within this burst should carry a
    /// stamp. Callers using the `ALWAYS` sentinel should build their plan
    /// with [`BurstPlan::always`] and stamp every message unconditionally
    /// instead of calling this.
    pub fn carries_stamp(&self, sub_index: u32) -> bool {
        self.latency_sub_index == Some(sub_index)
    }

    /// Builds a plan where every message in the burst is latency-bearing,
    /// for the `ALWAYS` sentinel.
    pub fn always(rate: u32, ticks_per_sec: u32, current_tick: u32) -> Self {
        let count = burst_size(rate, ticks_per_sec, current_tick);
        Self { count, latency_sub_index: None }
    }
}
