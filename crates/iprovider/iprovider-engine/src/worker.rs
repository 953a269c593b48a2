//! Interactive-provider per-connection worker (§4.12): drains the
//! refresh-items dual-list, rotates updates/generics, reflects inbound
//! posts, and accounts packed-message buffers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use perfcore_items::{BurstPlan, TemplateIterator, TemplatePool};
use perfcore_latency::LatencyRandomArray;
use perfcore_stats::{CountStat, TimeRecord, TimeRecordQueue};
use perfcore_transport::{Channel, SubmitOutcome, WireMsg};

use crate::refresh_list::{ItemInfo, RefreshItemsList};
use crate::session::{ProviderSession, ProviderSessionState};

#[derive(Default)]
pub struct ProviderStats {
    pub refreshes_sent: CountStat,
    pub updates_sent: CountStat,
    pub generics_sent: CountStat,
    pub generics_received: CountStat,
    pub posts_reflected: CountStat,
    /// One per packed buffer flushed, as opposed to `updates_sent` which
    /// counts every contained message (§4.12 packed-message mode).
    pub packed_msg_count: CountStat,
    pub update_msg_count: CountStat,
    pub latency_updates_sent: CountStat,
    pub latency_queue: TimeRecordQueue,
}

pub struct ProviderWorkerConfig {
    pub updates_per_tick: u32,
    pub generics_per_tick: u32,
    pub ticks_per_sec: u32,
    pub max_pack_count: u32,
    pub domain: String,
    /// Per-tick latency-stamp schedule for updates (§4.4/§4.8); `None`
    /// means no update ever carries a stamp.
    pub latency_array: Option<LatencyRandomArray>,
}

/// Rotating membership list of streams that have a completed refresh and
/// are now eligible for update/generic rotation.
#[derive(Default)]
struct Rotation {
    items: Vec<u32>,
    cursor: usize,
}

impl Rotation {
    fn push(&mut self, stream_id: u32) {
        self.items.push(stream_id);
    }

    fn next(&mut self) -> Option<u32> {
        if self.items.is_empty() {
            return None;
        }
        let id = self.items[self.cursor % self.items.len()];
        self.cursor = (self.cursor + 1) % self.items.len();
        Some(id)
    }
}

pub struct ProviderWorker {
    session: ProviderSession,
    channel: Box<dyn Channel>,
    refresh_list: RefreshItemsList,
    updates: Rotation,
    template_iters: std::collections::HashMap<u32, TemplateIterator>,
    templates: Arc<TemplatePool>,
    stats: ProviderStats,
    config: ProviderWorkerConfig,
    shutdown: Arc<AtomicBool>,
    current_tick: u32,
    pack_buffer_len: u32,
}

impl ProviderWorker {
    pub fn new(
        channel: Box<dyn Channel>,
        templates: Arc<TemplatePool>,
        config: ProviderWorkerConfig,
        shutdown: Arc<AtomicBool>,
        supports_post: bool,
    ) -> Self {
        Self {
            session: ProviderSession::new(supports_post),
            channel,
            refresh_list: RefreshItemsList::new(),
            updates: Rotation::default(),
            template_iters: std::collections::HashMap::new(),
            templates,
            stats: ProviderStats::default(),
            config,
            shutdown,
            current_tick: 0,
            pack_buffer_len: 0,
        }
    }

    pub fn session_state(&self) -> ProviderSessionState {
        self.session.state()
    }

    pub fn stats(&self) -> &ProviderStats {
        &self.stats
    }

    pub fn request_item(&self, stream_id: u32, snapshot: bool) {
        self.refresh_list.push(ItemInfo { stream_id, snapshot });
    }

    pub fn accept_connection(&mut self) {
        self.session.on_connection_accepted();
    }

    pub fn on_login_request(&mut self) {
        if self.session.on_login_request() {
            self.submit(0);
        }
    }

    pub fn on_directory_request(&mut self) {
        if self.session.on_directory_request() {
            self.submit(0);
        }
    }

    fn submit(&mut self, stream_id: u32) -> SubmitOutcome {
        let msg = WireMsg::new(stream_id, Vec::new());
        self.channel.submit(&msg)
    }

    /// Drains the refresh-items list, sends one refresh per item, and
    /// enrolls each into the update rotation (§4.12 step 1).
    fn drain_refreshes(&mut self) {
        for item in self.refresh_list.swap_and_drain() {
            match self.submit(item.stream_id) {
                SubmitOutcome::Sent => {
                    self.stats.refreshes_sent.incr();
                    if !item.snapshot {
                        self.updates.push(item.stream_id);
                    }
                }
                SubmitOutcome::WouldBlock | SubmitOutcome::CallAgain => {
                    self.refresh_list.push(item);
                }
            }
        }
    }

    fn send_updates(&mut self, plan: &BurstPlan) {
        let mut packed = 0u32;
        for sub_index in 0..plan.count {
            let Some(stream_id) = self.updates.next() else { break };
            self.advance_template_iter(stream_id);
            if plan.carries_stamp(sub_index) {
                self.stats.latency_updates_sent.incr();
            }

            if self.config.max_pack_count > 1 {
                self.pack_buffer_len += 1;
                self.stats.update_msg_count.incr();
                packed += 1;
                if self.pack_buffer_len >= self.config.max_pack_count {
                    self.flush_packed_buffer();
                }
            } else if self.submit(stream_id) == SubmitOutcome::Sent {
                self.stats.updates_sent.incr();
                self.stats.update_msg_count.incr();
            }
        }
        if packed > 0 && self.pack_buffer_len > 0 {
            self.flush_packed_buffer();
        }
    }

    fn flush_packed_buffer(&mut self) {
        if self.pack_buffer_len == 0 {
            return;
        }
        if self.submit(0) == SubmitOutcome::Sent {
            self.stats.packed_msg_count.incr();
            self.stats.updates_sent.add(self.pack_buffer_len as u64);
        }
        self.pack_buffer_len = 0;
    }

    fn send_generics(&mut self, count: u32) {
        for _ in 0..count {
            let Some(stream_id) = self.updates.next() else { break };
            if self.submit(stream_id) == SubmitOutcome::Sent {
                self.stats.generics_sent.incr();
            }
        }
    }

    fn advance_template_iter(&mut self, stream_id: u32) {
        let iter = self.template_iters.entry(stream_id).or_default();
        self.templates.next_update(&self.config.domain, iter);
    }

    /// Reflects an inbound post as an update: domain and publisher id are
    /// copied from the post and the enclosed update is re-submitted
    /// (§4.12).
    pub fn reflect_post(&mut self, stream_id: u32, stamp_nanos: Option<u64>, now: u64) {
        self.stats.posts_reflected.incr();
        if let Some(start) = stamp_nanos {
            self.stats.latency_queue.push(TimeRecord::new(start, now, perfcore_clock::ticks_per_usec()));
        }
        let _ = self.submit(stream_id);
    }

    pub fn on_generic_received(&mut self) {
        self.stats.generics_received.incr();
    }

    pub fn run_tick(&mut self) {
        if self.shutdown.load(Ordering::Relaxed) {
            self.session.shutdown();
            self.channel.close();
            return;
        }

        self.drain_refreshes();

        let latency_index = self.config.latency_array.as_mut().map(|arr| arr.next());
        let update_plan = BurstPlan::for_tick(
            self.config.updates_per_tick,
            self.config.ticks_per_sec,
            self.current_tick,
            latency_index,
        );
        self.send_updates(&update_plan);

        let generic_burst = perfcore_clock::burst_size(
            self.config.generics_per_tick,
            self.config.ticks_per_sec,
            self.current_tick,
        );
        self.send_generics(generic_burst);

        self.current_tick = (self.current_tick + 1) % self.config.ticks_per_sec.max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfcore_transport::LoopbackChannel;

    fn worker() -> ProviderWorker {
        let (a, _b) = LoopbackChannel::pair();
        let templates = Arc::new(TemplatePool::new());
        let config = ProviderWorkerConfig {
            updates_per_tick: 10,
            generics_per_tick: 0,
            ticks_per_sec: 10,
            max_pack_count: 1,
            domain: "MarketPrice".into(),
            latency_array: None,
        };
        ProviderWorker::new(Box::new(a), templates, config, Arc::new(AtomicBool::new(false)), false)
    }

    #[test]
    fn requested_item_is_refreshed_and_enrolled_for_updates() {
        let mut w = worker();
        w.request_item(1, false);
        w.run_tick();
        assert_eq!(w.stats.refreshes_sent.get_change(), 1);
    }

    #[test]
    fn snapshot_items_are_not_enrolled_in_update_rotation() {
        let mut w = worker();
        w.request_item(1, true);
        w.run_tick();
        assert_eq!(w.updates.next(), None);
    }

    #[test]
    fn packed_mode_counts_packed_and_update_messages_separately() {
        let mut w = worker();
        w.config.max_pack_count = 3;
        w.request_item(1, false);
        w.run_tick();
        for _ in 0..3 {
            w.run_tick();
        }
        assert!(w.stats.update_msg_count.get_total() >= 3);
    }

    #[test]
    fn latency_array_marks_some_updates_as_stamped() {
        let mut w = worker();
        let mut rng = rand::thread_rng();
        w.config.latency_array = Some(LatencyRandomArray::new(10, 5, 10, 1, &mut rng).unwrap());
        w.request_item(1, false);
        for _ in 0..11 {
            w.run_tick();
        }
        assert!(w.stats.latency_updates_sent.get_total() > 0);
    }

    #[test]
    fn shutdown_flag_closes_the_session() {
        let mut w = worker();
        w.shutdown.store(true, Ordering::Relaxed);
        w.run_tick();
        assert_eq!(w.session_state(), ProviderSessionState::Shutdown);
    }
}
