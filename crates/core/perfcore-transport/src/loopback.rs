//! In-process `Channel` implementation for tests and for wiring a consumer
//! thread directly to a provider thread inside one process, as a
//! request/response duplex pair.

use crate::{Channel, SubmitOutcome, WireMsg};
use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::Duration;

/// An injectable sequence of outcomes a test wants `submit` to return
/// before falling through to the real bounded-channel send, so backpressure
/// (S3) can be exercised deterministically.
#[derive(Debug, Default)]
pub struct FaultSchedule {
    queued: VecDeque<SubmitOutcome>,
}

impl FaultSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: SubmitOutcome) -> &mut Self {
        self.queued.push_back(outcome);
        self
    }

    fn next(&mut self) -> Option<SubmitOutcome> {
        self.queued.pop_front()
    }
}

/// One end of an in-process duplex pair. `submit` sends on `tx`; `poll`
/// receives from `rx`. Construct both ends with [`LoopbackChannel::pair`].
pub struct LoopbackChannel {
    tx: Sender<WireMsg>,
    rx: Receiver<WireMsg>,
    faults: FaultSchedule,
    closed: bool,
}

impl LoopbackChannel {
    /// Builds a connected pair: messages submitted on `a` are polled from
    /// `b` and vice versa.
    pub fn pair() -> (LoopbackChannel, LoopbackChannel) {
        let (tx_a, rx_b) = channel();
        let (tx_b, rx_a) = channel();
        (
            LoopbackChannel { tx: tx_a, rx: rx_a, faults: FaultSchedule::new(), closed: false },
            LoopbackChannel { tx: tx_b, rx: rx_b, faults: FaultSchedule::new(), closed: false },
        )
    }

    /// Installs a fault schedule consumed (in order) by the next calls to
    /// `submit`, before it falls back to the real send.
    pub fn with_faults(mut self, faults: FaultSchedule) -> Self {
        self.faults = faults;
        self
    }
}

impl Channel for LoopbackChannel {
    fn submit(&mut self, msg: &WireMsg) -> SubmitOutcome {
        if self.closed {
            return SubmitOutcome::WouldBlock;
        }
        if let Some(outcome) = self.faults.next() {
            return outcome;
        }
        match self.tx.send(msg.clone()) {
            Ok(()) => SubmitOutcome::Sent,
            Err(_) => SubmitOutcome::WouldBlock,
        }
    }

    fn poll(&mut self, timeout: Duration) -> Option<WireMsg> {
        if self.closed {
            return None;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => Some(msg),
            Err(_) => None,
        }
    }

    fn close(&mut self) {
        self.closed = true;
        // Drain so a peer blocked in a bounded send (not used here, mpsc is
        // unbounded, but kept for parity with a future bounded variant)
        // never hangs on a full channel after we stop polling.
        while matches!(self.rx.try_recv(), Ok(_)) {}
    }
}

impl Drop for LoopbackChannel {
    fn drop(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_then_poll_delivers_the_message() {
        let (mut a, mut b) = LoopbackChannel::pair();
        let msg = WireMsg::new(1, vec![1, 2, 3]);
        assert_eq!(a.submit(&msg), SubmitOutcome::Sent);
        assert_eq!(b.poll(Duration::from_millis(100)), Some(msg));
    }

    #[test]
    fn poll_times_out_with_nothing_sent() {
        let (_a, mut b) = LoopbackChannel::pair();
        assert_eq!(b.poll(Duration::from_millis(10)), None);
    }

    #[test]
    fn fault_schedule_overrides_submit_outcome() {
        let mut faults = FaultSchedule::new();
        faults.push(SubmitOutcome::WouldBlock).push(SubmitOutcome::CallAgain);
        let (mut a, _b) = LoopbackChannel::pair();
        a = a.with_faults(faults);
        let msg = WireMsg::new(1, vec![]);
        assert_eq!(a.submit(&msg), SubmitOutcome::WouldBlock);
        assert_eq!(a.submit(&msg), SubmitOutcome::CallAgain);
        assert_eq!(a.submit(&msg), SubmitOutcome::Sent);
    }

    #[test]
    fn closed_channel_refuses_submit_and_poll() {
        let (mut a, mut b) = LoopbackChannel::pair();
        a.close();
        assert_eq!(a.submit(&WireMsg::new(1, vec![])), SubmitOutcome::WouldBlock);
        assert_eq!(b.poll(Duration::from_millis(10)), None);
    }
}
