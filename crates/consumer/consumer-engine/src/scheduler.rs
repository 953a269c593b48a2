//! Rate-shaped scheduler (§4.8), consumer variant: item requests, posts,
//! and generic messages, each on its own sub-rate.

use perfcore_items::BurstPlan;
use perfcore_latency::LatencyRandomArray;

/// One sub-rate's burst plan for the current tick.
pub struct TickPlan {
    pub request: BurstPlan,
    pub post: BurstPlan,
    pub generic: BurstPlan,
}

pub struct Scheduler {
    ticks_per_sec: u32,
    current_tick: u32,
    request_rate: u32,
    post_rate: u32,
    generic_rate: u32,
    post_latency_array: Option<LatencyRandomArray>,
    generic_latency_array: Option<LatencyRandomArray>,
}

impl Scheduler {
    pub fn new(
        ticks_per_sec: u32,
        request_rate: u32,
        post_rate: u32,
        generic_rate: u32,
        post_latency_array: Option<LatencyRandomArray>,
        generic_latency_array: Option<LatencyRandomArray>,
    ) -> Self {
        Self {
            ticks_per_sec,
            current_tick: 0,
            request_rate,
            post_rate,
            generic_rate,
            post_latency_array,
            generic_latency_array,
        }
    }

    /// Computes this tick's burst plan and advances the tick counter
    /// (mod `ticks_per_sec`) for next time.
    pub fn tick(&mut self) -> TickPlan {
        let tick = self.current_tick;

        let request = BurstPlan::for_tick(self.request_rate, self.ticks_per_sec, tick, None);

        let post = match &mut self.post_latency_array {
            Some(arr) => BurstPlan::for_tick(self.post_rate, self.ticks_per_sec, tick, Some(arr.next())),
            None => BurstPlan::always(self.post_rate, self.ticks_per_sec, tick),
        };

        let generic = match &mut self.generic_latency_array {
            Some(arr) => BurstPlan::for_tick(self.generic_rate, self.ticks_per_sec, tick, Some(arr.next())),
            None => BurstPlan::always(self.generic_rate, self.ticks_per_sec, tick),
        };

        self.current_tick = (self.current_tick + 1) % self.ticks_per_sec.max(1);
        TickPlan { request, post, generic }
    }

    pub fn current_tick(&self) -> u32 {
        self.current_tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_wraps_at_ticks_per_sec() {
        let mut s = Scheduler::new(4, 100, 0, 0, None, None);
        for _ in 0..4 {
            s.tick();
        }
        assert_eq!(s.current_tick(), 0);
    }

    #[test]
    fn request_burst_sums_to_rate_over_one_second() {
        let mut s = Scheduler::new(10, 37, 0, 0, None, None);
        let total: u32 = (0..10).map(|_| s.tick().request.count).sum();
        assert_eq!(total, 37);
    }

    #[test]
    fn no_latency_array_means_every_post_is_stamped() {
        let mut s = Scheduler::new(10, 0, 10, 0, None, None);
        let plan = s.tick();
        assert_eq!(plan.post.latency_sub_index, None);
        assert!(plan.post.count > 0);
    }
}
