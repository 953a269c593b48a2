//! Latency stamp encode/decode (§4.7): one of three reserved fields per
//! message class, `TIM_TRK_1/2/3`.

/// Which of the three reserved latency fields a message uses, selected by
/// the kind of traffic the message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    /// `TIM_TRK_1`: update messages.
    Update,
    /// `TIM_TRK_2`: post messages.
    Post,
    /// `TIM_TRK_3`: generic messages, and the field always carried (blank)
    /// on refresh/image messages regardless of which of the other two a
    /// later update on the same stream will use.
    Generic,
}

/// A stamped or blank latency field. Refreshes carry all three placeholders
/// blank so the wire layout never has to special-case the refresh path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LatencyStamp {
    pub tim_trk_1: Option<u64>,
    pub tim_trk_2: Option<u64>,
    pub tim_trk_3: Option<u64>,
}

/// Stamps `send_time_nanos` into the field selected by `class`, leaving the
/// other two blank.
pub fn encode_stamp(class: MessageClass, send_time_nanos: u64) -> LatencyStamp {
    let mut stamp = LatencyStamp::default();
    match class {
        MessageClass::Update => stamp.tim_trk_1 = Some(send_time_nanos),
        MessageClass::Post => stamp.tim_trk_2 = Some(send_time_nanos),
        MessageClass::Generic => stamp.tim_trk_3 = Some(send_time_nanos),
    }
    stamp
}

/// Reads whichever field is present for `class`. A nanosecond-mode stamp is
/// divided by 1000 at aggregation time (by the caller), not here — decode
/// only recovers the raw value that was encoded.
pub fn decode_stamp(class: MessageClass, stamp: &LatencyStamp) -> Option<u64> {
    match class {
        MessageClass::Update => stamp.tim_trk_1,
        MessageClass::Post => stamp.tim_trk_2,
        MessageClass::Generic => stamp.tim_trk_3,
    }
}

/// A refresh/image message carries all three placeholders, always blank.
pub fn blank_refresh_stamp() -> LatencyStamp {
    LatencyStamp::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_sets_only_the_matching_field() {
        let s = encode_stamp(MessageClass::Update, 12345);
        assert_eq!(s.tim_trk_1, Some(12345));
        assert_eq!(s.tim_trk_2, None);
        assert_eq!(s.tim_trk_3, None);
    }

    #[test]
    fn decode_round_trips_per_class() {
        for (class, _) in [
            (MessageClass::Update, 1u64),
            (MessageClass::Post, 2u64),
            (MessageClass::Generic, 3u64),
        ] {
            let s = encode_stamp(class, 999);
            assert_eq!(decode_stamp(class, &s), Some(999));
        }
    }

    #[test]
    fn decode_returns_none_for_wrong_class() {
        let s = encode_stamp(MessageClass::Update, 42);
        assert_eq!(decode_stamp(MessageClass::Post, &s), None);
        assert_eq!(decode_stamp(MessageClass::Generic, &s), None);
    }

    #[test]
    fn refresh_stamp_is_always_blank() {
        let s = blank_refresh_stamp();
        assert_eq!(s, LatencyStamp::default());
    }
}
