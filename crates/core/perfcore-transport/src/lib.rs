//! The transport collaborator contract.
//!
//! The wire encoding and the real network transport are explicitly out of
//! scope for this workspace; this crate defines the boundary the engines
//! consume so they can be built and tested against an in-process
//! implementation ([`LoopbackChannel`]) instead.

mod loopback;

pub use loopback::{FaultSchedule, LoopbackChannel};

use std::time::Duration;

/// An opaque, already-encoded message handed to or received from a
/// [`Channel`]. Engines never inspect the bytes; encoding is the
/// transport library's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMsg {
    pub stream_id: u32,
    pub bytes: Vec<u8>,
}

impl WireMsg {
    pub fn new(stream_id: u32, bytes: Vec<u8>) -> Self {
        Self { stream_id, bytes }
    }
}

/// Result of a single [`Channel::submit`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The message was handed to the transport.
    Sent,
    /// No buffer space; not an error — the caller counts it and moves on
    /// (§7, §4.8 backpressure).
    WouldBlock,
    /// The transport wants the caller to flush and retry once; repeated
    /// `CallAgain` for the same message is a hard error at the call site.
    CallAgain,
}

/// One session's duplex connection to its counterpart. Implementations own
/// whatever OS or in-process resource backs the connection; `Channel`
/// itself only describes the non-blocking submit/poll/close contract every
/// worker drives its tick loop against.
pub trait Channel: Send {
    fn submit(&mut self, msg: &WireMsg) -> SubmitOutcome;
    fn poll(&mut self, timeout: Duration) -> Option<WireMsg>;
    fn close(&mut self);
}
