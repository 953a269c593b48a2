//! CPU affinity: a thin wrapper around `core_affinity`, called only from
//! each binary's thread-spawn site — engine crates never pin threads
//! themselves.

/// Pins the calling thread to `core_id`. No-op (logged by the caller, not
/// here) if the id isn't one of the IDs `core_affinity` reports as
/// available, since a bad `-threads` CPU list is a configuration concern,
/// not a transport one.
pub fn pin_current_thread(core_id: usize) -> bool {
    let Some(core_ids) = core_affinity::get_core_ids() else {
        return false;
    };
    let Some(target) = core_ids.into_iter().find(|c| c.id == core_id) else {
        return false;
    };
    core_affinity::set_for_current(target)
}

/// Parses a `-threads` style CPU list (`"0,2,4"`) into core ids, per §6.1's
/// `-threads CPU_LIST` flag.
pub fn parse_cpu_list(s: &str) -> Result<Vec<usize>, std::num::ParseIntError> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cpu_list_splits_on_comma() {
        assert_eq!(parse_cpu_list("0,2,4").unwrap(), vec![0, 2, 4]);
    }

    #[test]
    fn parse_cpu_list_trims_whitespace() {
        assert_eq!(parse_cpu_list(" 0, 1 ").unwrap(), vec![0, 1]);
    }

    #[test]
    fn parse_cpu_list_rejects_non_numeric() {
        assert!(parse_cpu_list("a,b").is_err());
    }
}
