//! Gateway counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of gateway statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayStats {
    /// Messages handed to the bus transport
    pub messages_published: u64,
    /// Messages dropped because no bus session existed
    pub messages_dropped: u64,
    /// Publish requests the transport refused
    pub publish_failures: u64,
    /// Mesh events that were logged but not forwarded
    pub events_ignored: u64,
    /// Mesh events that could not be mapped to a message
    pub malformed_events: u64,
    /// Bus sessions established
    pub connects: u64,
    /// Bus sessions torn down
    pub disconnects: u64,
    /// Failed connection attempts
    pub connect_failures: u64,
}

/// Shared counters behind [`GatewayStats`]
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) messages_published: AtomicU64,
    pub(crate) messages_dropped: AtomicU64,
    pub(crate) publish_failures: AtomicU64,
    pub(crate) events_ignored: AtomicU64,
    pub(crate) malformed_events: AtomicU64,
    pub(crate) connects: AtomicU64,
    pub(crate) disconnects: AtomicU64,
    pub(crate) connect_failures: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> GatewayStats {
        GatewayStats {
            messages_published: self.messages_published.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            events_ignored: self.events_ignored.load(Ordering::Relaxed),
            malformed_events: self.malformed_events.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
        }
    }
}
