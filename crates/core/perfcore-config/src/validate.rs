//! Cross-field rate validation shared by every tool's config (§4.13,
//! §6.1): checked once at startup, before any worker thread is spawned.

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("posting_rate > 0 is incompatible with snapshot requests")]
    PostingWithSnapshot,
    #[error("latency_posting_rate ({latency}) must not exceed posting_rate ({total})")]
    LatencyPostingExceedsPosting { latency: u32, total: u32 },
    #[error("latency_generic_rate ({latency}) must not exceed generic_rate ({total})")]
    LatencyGenericExceedsGeneric { latency: u32, total: u32 },
    #[error("latency_update_rate ({latency}) must not exceed update_rate ({total})")]
    LatencyUpdateExceedsUpdate { latency: u32, total: u32 },
}

/// Rates relevant to the "latency rate can't exceed the total rate it
/// samples from" and "posting is incompatible with snapshot" cross-field
/// checks from §4.13. Tools that don't have one of these rates (e.g. the
/// consumer has no update rate of its own to publish) pass `0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateFields {
    pub snapshot: bool,
    pub posting_rate: u32,
    pub latency_posting_rate: u32,
    pub update_rate: u32,
    pub latency_update_rate: u32,
    pub generic_rate: u32,
    pub latency_generic_rate: u32,
}

pub fn validate_rates(rates: &RateFields) -> Result<(), ValidationError> {
    if rates.posting_rate > 0 && rates.snapshot {
        return Err(ValidationError::PostingWithSnapshot);
    }
    if rates.latency_posting_rate > rates.posting_rate {
        return Err(ValidationError::LatencyPostingExceedsPosting {
            latency: rates.latency_posting_rate,
            total: rates.posting_rate,
        });
    }
    if rates.latency_update_rate > rates.update_rate {
        return Err(ValidationError::LatencyUpdateExceedsUpdate {
            latency: rates.latency_update_rate,
            total: rates.update_rate,
        });
    }
    if rates.latency_generic_rate > rates.generic_rate {
        return Err(ValidationError::LatencyGenericExceedsGeneric {
            latency: rates.latency_generic_rate,
            total: rates.generic_rate,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posting_with_snapshot_is_rejected() {
        let rates = RateFields { snapshot: true, posting_rate: 5, ..Default::default() };
        assert_eq!(validate_rates(&rates), Err(ValidationError::PostingWithSnapshot));
    }

    #[test]
    fn latency_rate_exceeding_total_is_rejected() {
        let rates = RateFields { posting_rate: 5, latency_posting_rate: 10, ..Default::default() };
        assert_eq!(
            validate_rates(&rates),
            Err(ValidationError::LatencyPostingExceedsPosting { latency: 10, total: 5 })
        );
    }

    #[test]
    fn matching_rates_are_accepted() {
        let rates = RateFields {
            posting_rate: 5,
            latency_posting_rate: 5,
            update_rate: 100,
            latency_update_rate: 10,
            generic_rate: 2,
            latency_generic_rate: 2,
            snapshot: false,
        };
        assert!(validate_rates(&rates).is_ok());
    }

    #[test]
    fn zero_rates_are_always_valid() {
        assert!(validate_rates(&RateFields::default()).is_ok());
    }
}
