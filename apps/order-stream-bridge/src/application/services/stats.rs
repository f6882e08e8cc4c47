//! Runtime Statistics
//!
//! Lock-free counters shared by the read loops, the execution relay and the
//! health endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Bridge-wide counters.
#[derive(Debug, Default)]
pub struct BridgeStats {
    records_received: AtomicU64,
    decode_failures: AtomicU64,
    orders_dispatched: AtomicU64,
    dispatch_failures: AtomicU64,
    executions_published: AtomicU64,
    publish_failures: AtomicU64,
    executions_dropped: AtomicU64,
}

impl BridgeStats {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A record was read from the orders topic.
    pub fn record_received(&self) {
        self.records_received.fetch_add(1, Ordering::Relaxed);
    }

    /// A record failed to decode.
    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// An order was submitted to the trading session.
    pub fn record_dispatched(&self) {
        self.orders_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// An order was dropped by the dispatcher.
    pub fn record_dispatch_failure(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// An execution event was acknowledged by the broker.
    pub fn record_execution_published(&self) {
        self.executions_published.fetch_add(1, Ordering::Relaxed);
    }

    /// An execution event failed to serialize or publish.
    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// An execution event was dropped before publishing.
    pub fn record_execution_dropped(&self) {
        self.executions_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values.
    #[must_use]
    pub fn snapshot(&self) -> BridgeStatsSnapshot {
        BridgeStatsSnapshot {
            records_received: self.records_received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            orders_dispatched: self.orders_dispatched.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            executions_published: self.executions_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            executions_dropped: self.executions_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`BridgeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStatsSnapshot {
    /// Records read from the orders topic.
    pub records_received: u64,
    /// Records dropped by the decoder.
    pub decode_failures: u64,
    /// Orders submitted to the trading session.
    pub orders_dispatched: u64,
    /// Orders dropped by the dispatcher.
    pub dispatch_failures: u64,
    /// Execution events published.
    pub executions_published: u64,
    /// Execution events that failed to publish.
    pub publish_failures: u64,
    /// Execution events dropped because the relay queue was full or closed.
    pub executions_dropped: u64,
}
