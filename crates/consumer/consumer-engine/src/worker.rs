//! Per-connection consumer worker (§4.10): owns the channel, drives the
//! session handshake, then runs the rate-shaped tick loop once
//! `ServiceUp` is reached.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use perfcore_config::PerfError;
use perfcore_items::{ItemRegistry, TemplateIterator, TemplatePool};
use perfcore_stats::TimeRecord;
use perfcore_transport::{Channel, SubmitOutcome, WireMsg};

use crate::protocol::{InboundEvent, OutboundRequest};
use crate::scheduler::Scheduler;
use crate::session::{Session, SessionState};
use crate::stats::{ThreadStats, WarmupController};

pub struct WorkerConfig {
    pub uname: String,
    pub app_name: String,
    pub service_name: String,
    pub posting_enabled: bool,
    pub local_dictionary_loaded: bool,
    pub requested_item_count: usize,
    pub delay_steady_state_calc_nanos: u64,
    pub channel_ping_timeout_nanos: u64,
    pub nano_time: bool,
}

pub struct Worker {
    session: Session,
    scheduler: Scheduler,
    registry: ItemRegistry,
    templates: Arc<TemplatePool>,
    template_iters: HashMap<u32, TemplateIterator>,
    channel: Box<dyn Channel>,
    stats: ThreadStats,
    warmup: WarmupController,
    shutdown: Arc<AtomicBool>,
    config: WorkerConfig,
    next_send_ping_time: u64,
    next_receive_ping_time: u64,
    call_again_retried: bool,
}

impl Worker {
    pub fn new(
        scheduler: Scheduler,
        registry: ItemRegistry,
        templates: Arc<TemplatePool>,
        channel: Box<dyn Channel>,
        shutdown: Arc<AtomicBool>,
        config: WorkerConfig,
        now: u64,
    ) -> Self {
        let item_count = config.requested_item_count;
        let warmup = WarmupController::new(item_count, config.delay_steady_state_calc_nanos);
        let next_send_ping_time = now + config.channel_ping_timeout_nanos / 3;
        let next_receive_ping_time = now + config.channel_ping_timeout_nanos;
        Self {
            session: Session::new(config.posting_enabled, config.local_dictionary_loaded),
            scheduler,
            registry,
            templates,
            template_iters: HashMap::new(),
            channel,
            stats: ThreadStats::new(),
            warmup,
            shutdown,
            config,
            next_send_ping_time,
            next_receive_ping_time,
            call_again_retried: false,
        }
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn image_retrieval_end(&self) -> Option<u64> {
        self.warmup.image_retrieval_end()
    }

    pub fn latency_queue(&self) -> &perfcore_stats::TimeRecordQueue {
        &self.stats.latency_queue
    }

    pub fn stats(&self) -> &ThreadStats {
        &self.stats
    }

    /// Seeds the request queue with every item this worker should fetch.
    /// Safe to call before the session reaches `ServiceUp`: the scheduler
    /// only pops from this queue once bursts start running.
    pub fn request_items(&mut self, stream_ids: impl IntoIterator<Item = u32>) {
        for id in stream_ids {
            let _ = self.registry.add_to_request_queue(id);
        }
    }

    fn submit(&mut self, req: OutboundRequest, stream_id: u32) -> SubmitOutcome {
        let msg = WireMsg::new(stream_id, Vec::new());
        let outcome = self.channel.submit(&msg);
        if outcome == SubmitOutcome::CallAgain {
            if self.call_again_retried {
                self.session.on_transport_failure();
            }
            self.call_again_retried = true;
        } else {
            self.call_again_retried = false;
        }
        let _ = req;
        outcome
    }

    /// Drives one tick: handshake progression (if not yet `ServiceUp`),
    /// ping bookkeeping, inbound dispatch, and — once `ServiceUp` or
    /// `SteadyState` — the scheduler's burst plan.
    pub fn run_tick(&mut self, now: u64, tick_slack: Duration) {
        if self.shutdown.load(Ordering::Relaxed) {
            self.session.shutdown();
            self.channel.close();
            return;
        }

        self.drive_handshake();
        self.drain_inbound(now, tick_slack);
        self.check_ping_deadlines(now);

        if matches!(self.session.state(), SessionState::ServiceUp | SessionState::SteadyState) {
            self.send_bursts(now);
        }

        if self.session.state() == SessionState::Failed {
            self.shutdown.store(true, Ordering::Relaxed);
        }
    }

    fn drive_handshake(&mut self) {
        match self.session.state() {
            SessionState::Connecting => {
                // Transport handshake completion is reported by the
                // channel out-of-band in a real transport; the loopback
                // test channel is considered up immediately.
                self.session.on_transport_handshake_complete();
            }
            SessionState::ChannelUp => {
                self.session.send_login();
                self.submit(
                    OutboundRequest::Login {
                        uname: self.config.uname.clone(),
                        app_name: self.config.app_name.clone(),
                        supports_post: self.config.posting_enabled,
                    },
                    0,
                );
            }
            SessionState::LoginOk => {
                self.session.send_directory_request();
                self.submit(OutboundRequest::DirectoryRequest, 0);
            }
            SessionState::DirectoryReceived => {
                self.session.begin_dictionary_requests();
                self.submit(OutboundRequest::DictionaryRequest { field: true }, 1);
                self.submit(OutboundRequest::DictionaryRequest { field: false }, 2);
            }
            SessionState::DictionariesReceived => {
                self.session.enter_service_up();
            }
            _ => {}
        }
    }

    fn drain_inbound(&mut self, now: u64, tick_slack: Duration) {
        while let Some(msg) = self.channel.poll(tick_slack) {
            if let Some(event) = decode_inbound(&msg) {
                self.next_receive_ping_time = now + self.config.channel_ping_timeout_nanos;
                self.handle_inbound(event, now);
            }
        }
    }

    fn check_ping_deadlines(&mut self, now: u64) {
        if now >= self.next_send_ping_time {
            self.submit(OutboundRequest::Ping, 0);
            self.next_send_ping_time = now + self.config.channel_ping_timeout_nanos / 3;
        }
        if now > self.next_receive_ping_time {
            self.session.on_transport_failure();
        }
    }

    /// Dispatches one already-decoded inbound event. Public so integration
    /// tests can drive the worker without a real transport/decoder.
    pub fn handle_inbound(&mut self, event: InboundEvent, now: u64) {
        match event {
            InboundEvent::LoginRefresh { supports_post } => self.session.on_login_refresh(supports_post),
            InboundEvent::LoginReject { reason } => self.session.on_login_rejected(reason),
            InboundEvent::DirectoryRefresh { service_found } => {
                self.session.on_directory_received(service_found)
            }
            InboundEvent::DictionaryFieldComplete => self.session.on_field_dictionary_complete(),
            InboundEvent::DictionaryEnumComplete => self.session.on_enum_dictionary_complete(),
            InboundEvent::ItemRefresh { stream_id } => {
                self.stats.refresh_count.incr();
                let _ = self.registry.move_to_refresh_complete(stream_id);
                self.warmup.note_refresh_complete_count(self.registry.count_in_refresh_complete(), now);
                if self.warmup.image_retrieval_end().is_some() {
                    self.session.enter_steady_state();
                }
            }
            InboundEvent::ItemStatusFinal { stream_id } => {
                if self.registry.on_final_status(stream_id).is_err() {
                    self.session.on_decode_failure(format!("unexpected close on stream {stream_id}"));
                } else {
                    self.stats.status_count.incr();
                }
            }
            InboundEvent::ItemUpdate { stamp_nanos, .. } => {
                self.record_update_latency(stamp_nanos, now);
            }
            InboundEvent::GenericMsg { stamp_nanos, .. } => {
                self.stats.generics_received.incr();
                if let Some(start) = stamp_nanos {
                    self.stats.latency_queue.push(TimeRecord::new(start, now, perfcore_clock::ticks_per_usec()));
                }
            }
            InboundEvent::Ping => {}
        }
    }

    fn record_update_latency(&mut self, stamp_nanos: Option<u64>, now: u64) {
        if self.warmup.is_steady_state(now) {
            self.stats.steady_update_count.incr();
        } else {
            self.stats.startup_update_count.incr();
        }
        if let Some(start) = stamp_nanos {
            self.stats.latency_queue.push(TimeRecord::new(start, now, perfcore_clock::ticks_per_usec()));
        }
    }

    fn send_bursts(&mut self, now: u64) {
        let plan = self.scheduler.tick();

        for _ in 0..plan.request.count {
            let Some(stream_id) = self.registry.pop_from_request_queue() else { break };
            self.stats.request_count.incr();
            let _ = self.registry.move_to_awaiting_refresh(stream_id);
            self.submit(
                OutboundRequest::ItemRequest { stream_id, snapshot: false },
                stream_id,
            );
        }

        for sub_index in 0..plan.post.count {
            let Some(stream_id) = self.registry.pop_post_rotation() else { break };
            let stamp_nanos = if plan.post.carries_stamp(sub_index) { Some(now) } else { None };
            match self.submit(OutboundRequest::Post { stream_id, stamp_nanos }, stream_id) {
                SubmitOutcome::Sent => {
                    self.stats.posts_sent.incr();
                }
                SubmitOutcome::WouldBlock => self.stats.posts_out_of_buffers.incr(),
                SubmitOutcome::CallAgain => {}
            }
            self.advance_template_iter(stream_id);
        }

        for sub_index in 0..plan.generic.count {
            let Some(stream_id) = self.registry.pop_generic_rotation() else { break };
            let stamp_nanos = if plan.generic.carries_stamp(sub_index) { Some(now) } else { None };
            match self.submit(OutboundRequest::Generic { stream_id, stamp_nanos }, stream_id) {
                SubmitOutcome::Sent => {
                    self.stats.generics_sent.incr();
                    if stamp_nanos.is_some() {
                        self.stats.latency_generics_sent.incr();
                    }
                }
                SubmitOutcome::WouldBlock => self.stats.generics_out_of_buffers.incr(),
                SubmitOutcome::CallAgain => {}
            }
            self.advance_template_iter(stream_id);
        }
    }

    fn advance_template_iter(&mut self, stream_id: u32) {
        let Ok(record) = self.registry.resolve(stream_id) else { return };
        let domain = record.domain.clone();
        let iter = self.template_iters.entry(stream_id).or_default();
        self.templates.next_update(&domain, iter);
    }
}

fn decode_inbound(_msg: &WireMsg) -> Option<InboundEvent> {
    // The concrete wire encoding is out of scope here; a real binary
    // supplies its own decode step ahead of this worker. Tests drive
    // `handle_inbound` directly instead of round-tripping bytes.
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfcore_items::ItemRecord;
    use perfcore_transport::LoopbackChannel;

    fn worker() -> Worker {
        let scheduler = Scheduler::new(10, 10, 0, 0, None, None);
        let rec = ItemRecord::new(100, "MarketPrice", "ITEM_A");
        let registry = ItemRegistry::new(100, vec![rec]);
        let templates = Arc::new(TemplatePool::new());
        let (a, _b) = LoopbackChannel::pair();
        let shutdown = Arc::new(AtomicBool::new(false));
        let config = WorkerConfig {
            uname: "user".into(),
            app_name: "cons-perf".into(),
            service_name: "DIRECT_FEED".into(),
            posting_enabled: false,
            local_dictionary_loaded: true,
            requested_item_count: 1,
            delay_steady_state_calc_nanos: 1_000,
            channel_ping_timeout_nanos: 30_000_000_000,
            nano_time: false,
        };
        Worker::new(scheduler, registry, templates, Box::new(a), shutdown, config, 0)
    }

    #[test]
    fn handshake_progresses_through_states_on_ticks() {
        let mut w = worker();
        assert_eq!(w.session_state(), SessionState::Connecting);
        w.run_tick(0, Duration::from_millis(1));
        assert_eq!(w.session_state(), SessionState::LoginSent);
    }

    #[test]
    fn refresh_sets_image_retrieval_end_once_item_count_reached() {
        let mut w = worker();
        w.handle_inbound(InboundEvent::ItemRefresh { stream_id: 100 }, 500);
        assert_eq!(w.image_retrieval_end(), Some(500));
        assert_eq!(w.stats.refresh_count.get_change(), 1);
    }

    #[test]
    fn status_while_waiting_for_refresh_fails_session() {
        let mut w = worker();
        w.registry.move_to_awaiting_refresh(100).unwrap();
        w.handle_inbound(InboundEvent::ItemStatusFinal { stream_id: 100 }, 10);
        assert_eq!(w.session_state(), SessionState::Failed);
    }

    #[test]
    fn shutdown_flag_closes_the_channel() {
        let mut w = worker();
        w.shutdown.store(true, Ordering::Relaxed);
        w.run_tick(0, Duration::from_millis(1));
        assert_eq!(w.session_state(), SessionState::Shutdown);
    }
}
