//! Deterministic per-tick latency-stamp schedule (§4.4).

use rand::Rng;

/// Sentinel meaning "every message in the burst carries a stamp"; when a
/// scheduler is configured this way the array is never consulted.
pub const ALWAYS: i32 = -1;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LatencyArrayError {
    #[error("total_msgs_per_sec, latency_msgs_per_sec, and ticks_per_sec must all be nonzero")]
    ZeroRate,
    #[error("latency_msgs_per_sec ({latency}) must not exceed total_msgs_per_sec ({total})")]
    LatencyExceedsTotal { latency: u32, total: u32 },
    #[error("set_count must be nonzero")]
    ZeroSetCount,
}

/// A pre-shuffled, pre-computed schedule of which sub-message within each
/// tick's burst should carry a latency stamp, repeating every `set_count`
/// one-second windows.
///
/// Built once at startup and then only read from via [`next`], so the
/// per-tick hot path never touches the RNG.
pub struct LatencyRandomArray {
    entries: Vec<i32>,
    cursor: usize,
}

impl LatencyRandomArray {
    /// Builds the schedule per §4.4:
    /// 1. fill the first `latency_msgs_per_sec` slots of each one-second
    ///    window with `1`, the rest with `-1`;
    /// 2. shuffle the window by swapping each slot with a random slot in
    ///    `[0, ticks_per_sec)`;
    /// 3. replace every surviving `1` with a random sub-index in
    ///    `[0, total_msgs_per_sec / ticks_per_sec)`, plus one if the slot's
    ///    position is less than `total_msgs_per_sec % ticks_per_sec`.
    pub fn new(
        total_msgs_per_sec: u32,
        latency_msgs_per_sec: u32,
        ticks_per_sec: u32,
        set_count: u32,
        rng: &mut impl Rng,
    ) -> Result<Self, LatencyArrayError> {
        if total_msgs_per_sec == 0 || latency_msgs_per_sec == 0 || ticks_per_sec == 0 {
            return Err(LatencyArrayError::ZeroRate);
        }
        if latency_msgs_per_sec > total_msgs_per_sec {
            return Err(LatencyArrayError::LatencyExceedsTotal {
                latency: latency_msgs_per_sec,
                total: total_msgs_per_sec,
            });
        }
        if set_count == 0 {
            return Err(LatencyArrayError::ZeroSetCount);
        }

        let base = total_msgs_per_sec / ticks_per_sec;
        let remainder = total_msgs_per_sec % ticks_per_sec;

        let mut entries = Vec::with_capacity((ticks_per_sec * set_count) as usize);
        for _ in 0..set_count {
            let mut window = vec![-1i32; ticks_per_sec as usize];
            for slot in window.iter_mut().take(latency_msgs_per_sec as usize) {
                *slot = 1;
            }
            for i in 0..window.len() {
                let j = rng.gen_range(0..window.len());
                window.swap(i, j);
            }
            for (i, slot) in window.iter_mut().enumerate() {
                if *slot == 1 {
                    let extra = if (i as u32) < remainder { 1 } else { 0 };
                    *slot = rng.gen_range(0..base.max(1)) as i32 + extra as i32;
                }
            }
            entries.extend(window);
        }

        Ok(Self { entries, cursor: 0 })
    }

    /// Returns the next sub-index to carry a latency stamp (or `-1` for
    /// none), advancing and wrapping the internal cursor.
    pub fn next(&mut self) -> i32 {
        let v = self.entries[self.cursor];
        self.cursor = (self.cursor + 1) % self.entries.len();
        v
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn zero_rate_inputs_fail_construction() {
        assert_eq!(
            LatencyRandomArray::new(0, 10, 1000, 1, &mut rng()).unwrap_err(),
            LatencyArrayError::ZeroRate
        );
        assert_eq!(
            LatencyRandomArray::new(1000, 0, 1000, 1, &mut rng()).unwrap_err(),
            LatencyArrayError::ZeroRate
        );
        assert_eq!(
            LatencyRandomArray::new(1000, 10, 0, 1, &mut rng()).unwrap_err(),
            LatencyArrayError::ZeroRate
        );
    }

    #[test]
    fn latency_exceeding_total_fails_construction() {
        assert_eq!(
            LatencyRandomArray::new(100, 200, 1000, 1, &mut rng()).unwrap_err(),
            LatencyArrayError::LatencyExceedsTotal { latency: 200, total: 100 }
        );
    }

    #[test]
    fn zero_set_count_fails_construction() {
        assert_eq!(
            LatencyRandomArray::new(1000, 10, 1000, 0, &mut rng()).unwrap_err(),
            LatencyArrayError::ZeroSetCount
        );
    }

    #[test]
    fn array_length_is_ticks_times_sets() {
        let a = LatencyRandomArray::new(1000, 100, 300, 4, &mut rng()).unwrap();
        assert_eq!(a.len(), 300 * 4);
    }

    #[test]
    fn exactly_latency_msgs_per_sec_slots_carry_a_stamp_per_window() {
        let ticks = 300u32;
        let sets = 3u32;
        let latency_rate = 50u32;
        let mut a = LatencyRandomArray::new(1000, latency_rate, ticks, sets, &mut rng()).unwrap();
        for _ in 0..sets {
            let stamped = (0..ticks).filter(|_| a.next() != -1).count();
            assert_eq!(stamped as u32, latency_rate);
        }
    }

    #[test]
    fn next_wraps_around() {
        let mut a = LatencyRandomArray::new(100, 10, 50, 1, &mut rng()).unwrap();
        let len = a.len();
        for _ in 0..len {
            a.next();
        }
        // After exactly one full cycle, cursor must be back at 0 — read the
        // same first value again.
        let first_again = a.next();
        let mut b = LatencyRandomArray::new(100, 10, 50, 1, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(first_again, b.next());
    }
}
