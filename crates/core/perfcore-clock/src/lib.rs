//! Monotonic clock and tick-period arithmetic for the traffic-generation tools.
//!
//! `now_nanos()` is the only source of time the scheduler, workers, and
//! latency pipeline read from — never wall-clock time, so the measurements
//! stay valid across NTP adjustments and DST changes.

#[cfg(target_os = "macos")]
use std::sync::OnceLock;

/// Returns the current monotonic time in nanoseconds.
///
/// Uses `CLOCK_MONOTONIC` via `clock_gettime` on non-Apple platforms and
/// `mach_absolute_time` (scaled by the mach timebase) on macOS, matching
/// the highest-resolution monotonic source each platform exposes.
#[inline(always)]
#[cfg(not(target_os = "macos"))]
pub fn now_nanos() -> u64 {
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
}

#[inline(always)]
#[cfg(target_os = "macos")]
#[allow(deprecated)]
pub fn now_nanos() -> u64 {
    static TIMEBASE: OnceLock<(u64, u64)> = OnceLock::new();
    let (numer, denom) = *TIMEBASE.get_or_init(|| {
        let mut info = libc::mach_timebase_info_data_t { numer: 0, denom: 0 };
        let rc = unsafe { libc::mach_timebase_info(&mut info) };
        if rc != 0 || info.denom == 0 {
            (1, 1)
        } else {
            (info.numer as u64, info.denom as u64)
        }
    });
    let t = unsafe { libc::mach_absolute_time() } as u128;
    ((t * numer as u128) / denom as u128) as u64
}

/// Current monotonic time in microseconds (`now_nanos() / 1000`).
#[inline(always)]
pub fn now_micros() -> u64 {
    now_nanos() / 1_000
}

/// Ticks of the monotonic clock per second. The clock is nanosecond-based,
/// so this is always `1_000_000_000` — exposed as a function (rather than a
/// constant) so callers needing `ticks_per_usec` for a `TimeRecord` don't
/// hardcode the conversion factor in more than one place.
#[inline(always)]
pub const fn ticks_per_second() -> u64 {
    1_000_000_000
}

/// Ticks of the monotonic clock per microsecond, used to convert a raw
/// `(end - start)` tick delta into microseconds: `delta / ticks_per_usec()`.
#[inline(always)]
pub const fn ticks_per_usec() -> u64 {
    ticks_per_second() / 1_000_000
}

/// Nanoseconds per scheduler tick at the given tick rate.
///
/// # Panics
/// Panics if `ticks_per_sec` is zero — a scheduler cannot divide time into
/// zero slices.
#[inline]
pub fn nsec_per_tick(ticks_per_sec: u32) -> u64 {
    assert!(ticks_per_sec > 0, "ticks_per_sec must be nonzero");
    ticks_per_second() / ticks_per_sec as u64
}

/// Splits a per-second rate across `ticks_per_sec` ticks: `rate / ticks`
/// messages on every tick, plus one extra on the first `rate % ticks` ticks
/// of each second.
///
/// Returns `(base, remainder)` where `base = rate / ticks_per_sec` and
/// `remainder = rate % ticks_per_sec`. The burst size for a given
/// `current_tick` (0-based, wrapping every `ticks_per_sec`) is
/// `base + 1` if `current_tick < remainder` else `base`.
#[inline]
pub fn split_rate(rate: u32, ticks_per_sec: u32) -> (u32, u32) {
    assert!(ticks_per_sec > 0, "ticks_per_sec must be nonzero");
    (rate / ticks_per_sec, rate % ticks_per_sec)
}

/// Burst size (messages to send) for `current_tick` given a per-second
/// `rate` distributed over `ticks_per_sec` ticks. See [`split_rate`].
#[inline]
pub fn burst_size(rate: u32, ticks_per_sec: u32, current_tick: u32) -> u32 {
    let (base, remainder) = split_rate(rate, ticks_per_sec);
    base + if current_tick < remainder { 1 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_nanos_is_monotonic() {
        let a = now_nanos();
        let b = now_nanos();
        assert!(b >= a);
    }

    #[test]
    fn nsec_per_tick_divides_evenly_for_common_rates() {
        assert_eq!(nsec_per_tick(1000), 1_000_000);
        assert_eq!(nsec_per_tick(1), 1_000_000_000);
    }

    #[test]
    fn split_rate_matches_base_plus_remainder() {
        assert_eq!(split_rate(1000, 300), (3, 100));
        assert_eq!(split_rate(10, 10), (1, 0));
    }

    #[test]
    fn burst_size_sums_to_rate_times_seconds() {
        let rate = 1000u32;
        let ticks = 300u32;
        let mut total = 0u64;
        for t in 0..ticks {
            total += burst_size(rate, ticks, t) as u64;
        }
        assert_eq!(total, rate as u64);
    }

    #[test]
    fn burst_size_handles_rate_smaller_than_ticks() {
        // rate < ticks_per_sec: base is 0, remainder ticks get exactly one message.
        let rate = 7u32;
        let ticks = 10u32;
        let mut total = 0u64;
        for t in 0..ticks {
            total += burst_size(rate, ticks, t) as u64;
        }
        assert_eq!(total, rate as u64);
    }
}
