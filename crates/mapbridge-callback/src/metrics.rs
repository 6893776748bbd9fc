//! Callback channel metrics
//!
//! Local atomic counters for [`ChannelStats`] snapshots, mirrored to the
//! `metrics` facade so an installed recorder can export them.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of the channel counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Connections accepted by the listener
    pub accepted: u64,
    /// Connections refused because of the connection limit
    pub rejected: u64,
    /// Currently open connections
    pub active: u64,
    /// Requests refused because of a foreign `Host` header
    pub forbidden: u64,
    /// Requests dropped by the sequence gate
    pub discarded_stale: u64,
    /// Callback bodies that did not parse
    pub malformed: u64,
    /// Callbacks handed to the consumer
    pub dispatched: u64,
    /// Buffers fetched by the polling loop
    pub polls: u64,
}

/// Channel metrics collector
#[derive(Debug)]
pub struct ChannelMetrics {
    accepted: AtomicU64,
    rejected: AtomicU64,
    active: AtomicU64,
    forbidden: AtomicU64,
    discarded_stale: AtomicU64,
    malformed: AtomicU64,
    dispatched: AtomicU64,
    polls: AtomicU64,
}

impl ChannelMetrics {
    pub fn new() -> Self {
        describe_counter!("callback_connections_accepted_total", "Total callback connections accepted");
        describe_counter!(
            "callback_connections_rejected_total",
            "Total callback connections rejected at the connection limit"
        );
        describe_counter!("callback_requests_forbidden_total", "Total requests with a foreign Host header");
        describe_counter!("callback_requests_stale_total", "Total requests dropped as stale or duplicate");
        describe_counter!("callback_bodies_malformed_total", "Total callback bodies that failed to parse");
        describe_counter!("callback_dispatched_total", "Total callbacks dispatched");
        describe_counter!("callback_polls_total", "Total polling round trips");
        describe_gauge!("callback_connections_active", "Currently open callback connections");

        Self {
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            active: AtomicU64::new(0),
            forbidden: AtomicU64::new(0),
            discarded_stale: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
            polls: AtomicU64::new(0),
        }
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        let active = self.active.fetch_add(1, Ordering::Relaxed) + 1;
        counter!("callback_connections_accepted_total").increment(1);
        gauge!("callback_connections_active").set(active as f64);
    }

    pub fn record_closed(&self) {
        let active = self.active.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        gauge!("callback_connections_active").set(active as f64);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        counter!("callback_connections_rejected_total").increment(1);
    }

    pub fn record_forbidden(&self) {
        self.forbidden.fetch_add(1, Ordering::Relaxed);
        counter!("callback_requests_forbidden_total").increment(1);
    }

    pub fn record_stale(&self) {
        self.discarded_stale.fetch_add(1, Ordering::Relaxed);
        counter!("callback_requests_stale_total").increment(1);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
        counter!("callback_bodies_malformed_total").increment(1);
    }

    pub fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        counter!("callback_dispatched_total").increment(1);
    }

    pub fn record_poll(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
        counter!("callback_polls_total").increment(1);
    }

    pub fn active_connections(&self) -> u64 {
        self.active.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
            forbidden: self.forbidden.load(Ordering::Relaxed),
            discarded_stale: self.discarded_stale.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
        }
    }
}

impl Default for ChannelMetrics {
    fn default() -> Self {
        Self::new()
    }
}
