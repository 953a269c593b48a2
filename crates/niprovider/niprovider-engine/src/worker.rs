//! Non-interactive provider worker: publishes update bursts for every
//! configured item without ever being asked, once the login/directory
//! handshake is pushed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use perfcore_items::{BurstPlan, TemplateIterator, TemplatePool};
use perfcore_latency::LatencyRandomArray;
use perfcore_stats::CountStat;
use perfcore_transport::{Channel, SubmitOutcome, WireMsg};

use crate::session::{NiSession, NiSessionState};

pub struct NiWorkerConfig {
    pub update_rate: u32,
    pub ticks_per_sec: u32,
    pub domain: String,
    pub stream_ids: Vec<u32>,
}

#[derive(Default)]
pub struct NiStats {
    pub updates_sent: CountStat,
    pub out_of_buffers: CountStat,
    pub latency_updates_sent: CountStat,
}

pub struct NiWorker {
    session: NiSession,
    channel: Box<dyn Channel>,
    templates: Arc<TemplatePool>,
    template_iters: std::collections::HashMap<u32, TemplateIterator>,
    latency_array: Option<LatencyRandomArray>,
    config: NiWorkerConfig,
    stats: NiStats,
    shutdown: Arc<AtomicBool>,
    current_tick: u32,
    rotation_cursor: usize,
}

impl NiWorker {
    pub fn new(
        channel: Box<dyn Channel>,
        templates: Arc<TemplatePool>,
        config: NiWorkerConfig,
        latency_array: Option<LatencyRandomArray>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            session: NiSession::new(),
            channel,
            templates,
            template_iters: std::collections::HashMap::new(),
            latency_array,
            config,
            stats: NiStats::default(),
            shutdown,
            current_tick: 0,
            rotation_cursor: 0,
        }
    }

    pub fn session_state(&self) -> NiSessionState {
        self.session.state()
    }

    pub fn stats(&self) -> &NiStats {
        &self.stats
    }

    fn drive_handshake(&mut self) {
        match self.session.state() {
            NiSessionState::LoginPending => {
                self.session.on_login_open();
                let _ = self.channel.submit(&WireMsg::new(0, Vec::new()));
            }
            NiSessionState::LoginOk => {
                self.session.push_directory_refresh();
                let _ = self.channel.submit(&WireMsg::new(0, Vec::new()));
            }
            NiSessionState::DirectoryPushed => self.session.begin_streaming(),
            _ => {}
        }
    }

    pub fn run_tick(&mut self, now: u64) {
        if self.shutdown.load(Ordering::Relaxed) {
            self.session.shutdown();
            self.channel.close();
            return;
        }

        self.drive_handshake();

        if self.session.state() != NiSessionState::Streaming {
            return;
        }

        let latency_index = self.latency_array.as_mut().map(|arr| arr.next());
        let plan = BurstPlan::for_tick(self.config.update_rate, self.config.ticks_per_sec, self.current_tick, latency_index);

        for sub_index in 0..plan.count {
            if self.config.stream_ids.is_empty() {
                break;
            }
            let stream_id = self.config.stream_ids[self.rotation_cursor % self.config.stream_ids.len()];
            self.rotation_cursor = (self.rotation_cursor + 1) % self.config.stream_ids.len();
            self.advance_template_iter(stream_id);

            if plan.carries_stamp(sub_index) {
                self.stats.latency_updates_sent.incr();
            }
            let _ = now;
            match self.channel.submit(&WireMsg::new(stream_id, Vec::new())) {
                SubmitOutcome::Sent => self.stats.updates_sent.incr(),
                SubmitOutcome::WouldBlock => self.stats.out_of_buffers.incr(),
                SubmitOutcome::CallAgain => {}
            }
        }

        self.current_tick = (self.current_tick + 1) % self.config.ticks_per_sec.max(1);
    }

    fn advance_template_iter(&mut self, stream_id: u32) {
        let iter = self.template_iters.entry(stream_id).or_default();
        self.templates.next_update(&self.config.domain, iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfcore_transport::LoopbackChannel;

    fn worker(update_rate: u32, ticks_per_sec: u32, item_count: u32) -> NiWorker {
        let (a, _b) = LoopbackChannel::pair();
        let templates = Arc::new(TemplatePool::new());
        let config = NiWorkerConfig {
            update_rate,
            ticks_per_sec,
            domain: "MarketPrice".into(),
            stream_ids: (1..=item_count).collect(),
        };
        NiWorker::new(Box::new(a), templates, config, None, Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn handshake_reaches_streaming_after_three_ticks() {
        let mut w = worker(10, 10, 5);
        w.run_tick(0);
        assert_eq!(w.session_state(), NiSessionState::LoginOk);
        w.run_tick(0);
        assert_eq!(w.session_state(), NiSessionState::DirectoryPushed);
        w.run_tick(0);
        assert_eq!(w.session_state(), NiSessionState::Streaming);
    }

    #[test]
    fn streaming_sends_update_bursts_without_being_requested() {
        let mut w = worker(100, 10, 5);
        for _ in 0..3 {
            w.run_tick(0);
        }
        for _ in 0..10 {
            w.run_tick(0);
        }
        assert!(w.stats().updates_sent.get_total() > 0);
    }

    #[test]
    fn shutdown_flag_closes_the_session() {
        let mut w = worker(10, 10, 5);
        w.shutdown.store(true, Ordering::Relaxed);
        w.run_tick(0);
        assert_eq!(w.session_state(), NiSessionState::Shutdown);
    }

    #[test]
    fn latency_array_marks_some_updates_as_stamped() {
        let mut w = worker(10, 10, 5);
        let mut rng = rand::thread_rng();
        w.latency_array = Some(LatencyRandomArray::new(10, 5, 10, 1, &mut rng).unwrap());
        for _ in 0..3 {
            w.run_tick(0);
        }
        for _ in 0..10 {
            w.run_tick(0);
        }
        assert!(w.stats().latency_updates_sent.get_total() > 0);
    }
}
