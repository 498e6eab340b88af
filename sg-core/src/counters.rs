//! Process-wide counters, written by their owning thread and read racily
//! by the supervisor for periodic stat reporting.

use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! counter_field {
    ($name:ident) => {
        /// Current value of this counter.
        pub fn $name(&self) -> u64 {
            self.$name.load(Ordering::Relaxed)
        }
    };
}

/// All counters exposed by the bridge and the generator.
///
/// Every field is an independent `AtomicU64`; there is no cross-field
/// consistency guarantee beyond what the owning component's logic
/// provides (eventual consistency is acceptable per the concurrency
/// model — the supervisor only samples these for human-readable
/// reporting, never for correctness decisions).
#[derive(Default)]
pub struct Counters {
    amqp_received: AtomicU64,
    amqp_partial: AtomicU64,
    sock_sent: AtomicU64,
    sock_would_block: AtomicU64,
    amqp_decode_errs: AtomicU64,
    max_q_depth: AtomicU64,
    overruns: AtomicU64,
    processed: AtomicU64,
    queue_block: AtomicU64,
    amqp_sent: AtomicU64,
    metrics_sent: AtomicU64,
    acknowledged: AtomicU64,
    total_bursts: AtomicU64,
    burst_credit: AtomicU64,
}

impl Counters {
    /// Build a fresh, zeroed counter block.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_amqp_received(&self) {
        self.amqp_received.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_amqp_partial(&self) {
        self.amqp_partial.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_sock_sent(&self) {
        self.sock_sent.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_sock_would_block(&self) {
        self.sock_would_block.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_amqp_decode_errs(&self) {
        self.amqp_decode_errs.fetch_add(1, Ordering::Relaxed);
    }
    pub fn observe_max_q_depth(&self, in_use: u64) {
        self.max_q_depth.fetch_max(in_use, Ordering::Relaxed);
    }
    pub fn inc_overruns(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_queue_block(&self) {
        self.queue_block.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_amqp_sent(&self) {
        self.amqp_sent.fetch_add(1, Ordering::Relaxed);
    }
    pub fn add_metrics_sent(&self, n: u64) {
        self.metrics_sent.fetch_add(n, Ordering::Relaxed);
    }
    pub fn add_acknowledged(&self, n: u64) {
        self.acknowledged.fetch_add(n, Ordering::Relaxed);
    }
    pub fn inc_total_bursts(&self) {
        self.total_bursts.fetch_add(1, Ordering::Relaxed);
    }
    pub fn add_burst_credit(&self, n: u64) {
        self.burst_credit.fetch_add(n, Ordering::Relaxed);
    }

    counter_field!(amqp_received);
    counter_field!(amqp_partial);
    counter_field!(sock_sent);
    counter_field!(sock_would_block);
    counter_field!(amqp_decode_errs);
    counter_field!(max_q_depth);
    counter_field!(overruns);
    counter_field!(processed);
    counter_field!(queue_block);
    counter_field!(amqp_sent);
    counter_field!(metrics_sent);
    counter_field!(acknowledged);
    counter_field!(total_bursts);
    counter_field!(burst_credit);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_accumulate() {
        let c = Counters::new();
        assert_eq!(c.amqp_received(), 0);
        c.inc_amqp_received();
        c.inc_amqp_received();
        assert_eq!(c.amqp_received(), 2);

        c.observe_max_q_depth(5);
        c.observe_max_q_depth(3);
        assert_eq!(c.max_q_depth(), 5);
    }
}
