//! Resource-usage sampling: CPU fraction as
//! `Δ(user + kernel time) / Δ(wall time)` between two samples, plus
//! resident set size, read via `libc::rusage` (`RUSAGE_SELF`).

/// One point-in-time sample of process resource usage.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSnapshot {
    pub wall_nanos: u64,
    pub user_nanos: u64,
    pub system_nanos: u64,
    pub rss_bytes: u64,
}

fn timeval_to_nanos(tv: libc::timeval) -> u64 {
    tv.tv_sec as u64 * 1_000_000_000 + tv.tv_usec as u64 * 1_000
}

/// Samples `RUSAGE_SELF` plus the monotonic clock for the wall-time leg of
/// the CPU-fraction ratio.
pub fn sample() -> ResourceSnapshot {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    ResourceSnapshot {
        wall_nanos: perfcore_clock::now_nanos(),
        user_nanos: timeval_to_nanos(usage.ru_utime),
        system_nanos: timeval_to_nanos(usage.ru_stime),
        rss_bytes: rss_bytes(),
    }
}

/// Resident set size. On Linux, `getrusage`'s `ru_maxrss` is the lifetime
/// peak, not the current value, so `/proc/self/statm` (page count times
/// the system page size) is read instead, matching the original's choice.
#[cfg(target_os = "linux")]
fn rss_bytes() -> u64 {
    let Ok(text) = std::fs::read_to_string("/proc/self/statm") else {
        return 0;
    };
    let Some(pages) = text.split_whitespace().nth(1).and_then(|s| s.parse::<u64>().ok()) else {
        return 0;
    };
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) }.max(0) as u64;
    pages * page_size
}

#[cfg(not(target_os = "linux"))]
fn rss_bytes() -> u64 {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    usage.ru_maxrss as u64 * 1024
}

/// CPU fraction between two samples: `Δ(user + system) / Δ(wall)`, 0 if
/// the wall delta is zero (first sample, or a buggy zero-length interval).
pub fn cpu_fraction(prev: &ResourceSnapshot, curr: &ResourceSnapshot) -> f64 {
    let wall_delta = curr.wall_nanos.saturating_sub(prev.wall_nanos);
    if wall_delta == 0 {
        return 0.0;
    }
    let cpu_delta = (curr.user_nanos + curr.system_nanos)
        .saturating_sub(prev.user_nanos + prev.system_nanos);
    cpu_delta as f64 / wall_delta as f64
}
