//! Bus connection lifecycle
//!
//! The [`BusConnectionManager`] owns the single outbound bus session. It is
//! started and stopped by reachability transitions and accepts publish
//! requests from the event translator at any time:
//!
//! ```text
//!   reachability Up   ──► start()   ──► BusTransport::connect
//!   reachability Down ──► stop()    ──► BusTransport::disconnect
//!   translator        ──► publish() ──► BusTransport::publish (QoS 1)
//!                                   └─► dropped when no session exists
//! ```
//!
//! Bus-session connectedness (reported by the transport's own event stream)
//! is tracked separately from uplink reachability and never feeds back into
//! lifecycle decisions.

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::config::BrokerConfig;
use crate::error::{GatewayError, Result};
use crate::stats::{GatewayStats, StatsCounters};

/// Delivery guarantee requested for a publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    /// Fire and forget
    AtMostOnce,
    /// Acknowledged delivery, possibly duplicated
    AtLeastOnce,
    /// Exactly-once handshake
    ExactlyOnce,
}

/// Quality of service used for every gateway publish
pub const PUBLISH_QOS: QoS = QoS::AtLeastOnce;

/// Events emitted by a live bus session on the transport's own task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// Session established with the broker
    Connected,
    /// Session lost
    Disconnected,
    /// Broker acknowledged a publish
    Published {
        /// Packet identifier of the acknowledged publish
        pkid: u16,
    },
    /// Transport-level error
    Error {
        /// Error description
        reason: String,
    },
}

/// Callback a transport uses to report session events
pub type BusEventSink = Arc<dyn Fn(BusEvent) + Send + Sync>;

/// Publish/subscribe client library as seen by the gateway
pub trait BusTransport: Send + Sync + 'static {
    /// Handle of a live session
    type Session: Send + 'static;

    /// Open a session; events for it are reported through `events`
    fn connect(&self, config: &BrokerConfig, events: BusEventSink) -> Result<Self::Session>;

    /// Queue a publish without waiting for broker acknowledgement
    fn publish(&self, session: &Self::Session, topic: &str, payload: Bytes, qos: QoS)
        -> Result<()>;

    /// Tear the session down and release it
    fn disconnect(&self, session: Self::Session);
}

/// Destination for translated messages
pub trait MessageSink: Send + Sync {
    /// Hand a message over; never blocks and never fails
    fn publish(&self, topic: &str, payload: Bytes);
}

/// Flags updated from the session event stream
#[derive(Debug, Default)]
struct SessionFlags {
    /// Bumped on every start/stop so late events from an old session are ignored
    generation: AtomicU64,
    connected: AtomicBool,
}

/// Owns the lifetime of the single bus session
pub struct BusConnectionManager<T: BusTransport> {
    transport: T,
    config: BrokerConfig,
    session: Mutex<Option<T::Session>>,
    flags: Arc<SessionFlags>,
    stats: Arc<StatsCounters>,
}

impl<T: BusTransport> BusConnectionManager<T> {
    /// Create a manager with no session
    pub fn new(transport: T, config: BrokerConfig) -> Self {
        Self::with_stats(transport, config, Arc::new(StatsCounters::default()))
    }

    pub(crate) fn with_stats(
        transport: T,
        config: BrokerConfig,
        stats: Arc<StatsCounters>,
    ) -> Self {
        Self {
            transport,
            config,
            session: Mutex::new(None),
            flags: Arc::new(SessionFlags::default()),
            stats,
        }
    }

    /// Open a session unless one already exists
    ///
    /// A failed connect leaves the manager without a session. Nothing is
    /// retried here; the next Up transition tries again.
    pub fn start(&self) {
        let mut session = self.session.lock();
        if session.is_some() {
            debug!("Bus session already exists, start ignored");
            return;
        }

        let generation = self.flags.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.flags.connected.store(false, Ordering::SeqCst);

        info!("Starting bus client for {}", self.config.uri);
        match self.transport.connect(&self.config, self.event_sink(generation)) {
            Ok(handle) => {
                *session = Some(handle);
                StatsCounters::incr(&self.stats.connects);
            }
            Err(e) => {
                warn!("Failed to start bus client: {} [{}]", e, e.error_code());
                StatsCounters::incr(&self.stats.connect_failures);
            }
        }
    }

    /// Tear the session down if one exists
    pub fn stop(&self) {
        let mut session = self.session.lock();
        let Some(handle) = session.take() else {
            debug!("No bus session, stop ignored");
            return;
        };

        info!("Stopping bus client");
        self.flags.generation.fetch_add(1, Ordering::SeqCst);
        self.flags.connected.store(false, Ordering::SeqCst);
        self.transport.disconnect(handle);
        StatsCounters::incr(&self.stats.disconnects);
    }

    /// Publish with QoS 1, or drop the message when no session exists
    pub fn publish(&self, topic: &str, payload: Bytes) {
        let session = self.session.lock();
        let Some(handle) = session.as_ref() else {
            let err = GatewayError::TransportUnavailable {
                topic: topic.to_string(),
            };
            debug!("{}", err);
            StatsCounters::incr(&self.stats.messages_dropped);
            return;
        };

        match self.transport.publish(handle, topic, payload, PUBLISH_QOS) {
            Ok(()) => {
                trace!("Queued publish to {}", topic);
                StatsCounters::incr(&self.stats.messages_published);
            }
            Err(e) => {
                warn!("Bus publish failed: {} [{}]", e, e.error_code());
                StatsCounters::incr(&self.stats.publish_failures);
            }
        }
    }

    /// Whether a session handle exists
    pub fn has_session(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Whether the current session reported a broker connection
    pub fn is_connected(&self) -> bool {
        self.flags.connected.load(Ordering::SeqCst)
    }

    /// Broker configuration used for every connect
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Access the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> GatewayStats {
        self.stats.snapshot()
    }

    fn event_sink(&self, generation: u64) -> BusEventSink {
        let flags = self.flags.clone();
        Arc::new(move |event: BusEvent| {
            if flags.generation.load(Ordering::SeqCst) != generation {
                trace!("Ignoring event from stale bus session: {:?}", event);
                return;
            }
            match event {
                BusEvent::Connected => {
                    info!("Bus session connected");
                    flags.connected.store(true, Ordering::SeqCst);
                }
                BusEvent::Disconnected => {
                    info!("Bus session disconnected");
                    flags.connected.store(false, Ordering::SeqCst);
                }
                BusEvent::Published { pkid } => {
                    debug!("Bus publish acknowledged, pkid={}", pkid);
                }
                BusEvent::Error { reason } => {
                    warn!("Bus session error: {}", reason);
                }
            }
        })
    }
}

impl<T: BusTransport> MessageSink for BusConnectionManager<T> {
    fn publish(&self, topic: &str, payload: Bytes) {
        BusConnectionManager::publish(self, topic, payload)
    }
}

impl<T: BusTransport> Drop for BusConnectionManager<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.session.get_mut().take() {
            self.transport.disconnect(handle);
        }
    }
}
