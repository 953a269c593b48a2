//! Per-tick latency stamp scheduling (C4) and on-the-wire stamp encode/decode
//! (C7), kept together because the scheduler's chosen sub-index is only ever
//! consumed by the encoder.

mod random_array;
mod stamp;

pub use random_array::{LatencyRandomArray, LatencyArrayError, ALWAYS};
pub use stamp::{decode_stamp, encode_stamp, MessageClass};
