//! Delivery statistics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Server-wide delivery counters
///
/// Updated lock-free from dispatcher and publisher tasks.
#[derive(Debug)]
pub struct DeliveryStats {
    started_at: Instant,
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    messages_delivered: AtomicU64,
    messages_dropped: AtomicU64,
    write_failures: AtomicU64,
    publish_timeouts: AtomicU64,
}

impl DeliveryStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            connections_opened: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            messages_delivered: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            publish_timeouts: AtomicU64::new(0),
        }
    }

    pub fn record_connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// A message was written and flushed to its connection
    pub fn record_delivered(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// A message had no live subscriber
    pub fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_timeout(&self) {
        self.publish_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent-enough copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        let opened = self.connections_opened.load(Ordering::Relaxed);
        let closed = self.connections_closed.load(Ordering::Relaxed);

        StatsSnapshot {
            connections_opened: opened,
            active_connections: opened.saturating_sub(closed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            publish_timeouts: self.publish_timeouts.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for DeliveryStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy of [`DeliveryStats`] at one point in time
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    /// Total connections ever served
    pub connections_opened: u64,
    /// Connections currently being served
    pub active_connections: u64,
    /// Messages written to a connection
    pub messages_delivered: u64,
    /// Messages published with nobody listening
    pub messages_dropped: u64,
    /// Connections ended by a failed or timed-out write
    pub write_failures: u64,
    /// Publishes abandoned after the publish timeout
    pub publish_timeouts: u64,
    /// Time since the stats tracker was created
    pub uptime: Duration,
}
