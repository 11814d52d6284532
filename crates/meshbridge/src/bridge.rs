//! Gateway wiring
//!
//! [`Gateway`] builds the three core components and connects them once:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Gateway                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  link status ──► ReachabilityMonitor ── Up/Down ──┐          │
//! │                                                   ▼          │
//! │  mesh events ──► EventTranslator ──► BusConnectionManager ──►│ broker
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The collaborators receive the trait objects returned by
//! [`Gateway::reachability_listener`] and [`Gateway::mesh_handler`]; the
//! gateway itself holds no state beyond those references.
//!
//! # Example
//!
//! ```rust,ignore
//! use meshbridge::{Gateway, GatewayConfigBuilder, MqttTransport};
//!
//! let config = GatewayConfigBuilder::new()
//!     .broker_uri("mqtt://192.168.1.2:1883")
//!     .credentials("gateway", "secret")
//!     .build();
//! let gateway = Gateway::new(&config, MqttTransport::from_current()?);
//!
//! wifi.on_status_change(gateway.reachability_listener());
//! mesh.on_event(gateway.mesh_handler());
//! ```

use std::sync::Arc;
use tracing::{debug, info};

use crate::bus::{BusConnectionManager, BusTransport, MessageSink};
use crate::config::{BrokerConfig, GatewayConfig};
use crate::error::Result;
use crate::reachability::{ReachabilityListener, ReachabilityMonitor};
use crate::stats::{GatewayStats, StatsCounters};
use crate::translator::{EventTranslator, MeshEventHandler};

/// Mesh-to-bus gateway
pub struct Gateway<T: BusTransport> {
    monitor: Arc<ReachabilityMonitor>,
    bus: Arc<BusConnectionManager<T>>,
    translator: Arc<EventTranslator>,
    stats: Arc<StatsCounters>,
}

impl<T: BusTransport> Gateway<T> {
    /// Build and wire the gateway
    pub fn new(config: &GatewayConfig, transport: T) -> Self {
        Self::with_broker(config.broker.clone(), transport)
    }

    /// Validate the configuration, then build and wire the gateway
    pub fn try_new(config: &GatewayConfig, transport: T) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config, transport))
    }

    /// Build and wire the gateway from broker settings alone
    pub fn with_broker(broker: BrokerConfig, transport: T) -> Self {
        let stats = Arc::new(StatsCounters::default());

        let bus = Arc::new(BusConnectionManager::with_stats(
            transport,
            broker,
            stats.clone(),
        ));
        let monitor = Arc::new(ReachabilityMonitor::new());

        let lifecycle = Arc::downgrade(&bus);
        monitor.subscribe(Arc::new(move |reachable| {
            let Some(bus) = lifecycle.upgrade() else {
                debug!("Bus manager gone, ignoring reachability change");
                return;
            };
            if reachable {
                bus.start();
            } else {
                bus.stop();
            }
        }));

        let sink: Arc<dyn MessageSink> = bus.clone();
        let translator = Arc::new(EventTranslator::with_stats(sink, stats.clone()));

        info!("Gateway wired for broker {}", bus.config().uri);
        Self {
            monitor,
            bus,
            translator,
            stats,
        }
    }

    /// Listener to hand to the transport-reachability collaborator
    pub fn reachability_listener(&self) -> Arc<dyn ReachabilityListener> {
        self.monitor.clone()
    }

    /// Handler to hand to the mesh-stack collaborator
    pub fn mesh_handler(&self) -> Arc<dyn MeshEventHandler> {
        self.translator.clone()
    }

    /// The reachability monitor
    pub fn monitor(&self) -> &Arc<ReachabilityMonitor> {
        &self.monitor
    }

    /// The bus connection manager
    pub fn bus(&self) -> &Arc<BusConnectionManager<T>> {
        &self.bus
    }

    /// The event translator
    pub fn translator(&self) -> &Arc<EventTranslator> {
        &self.translator
    }

    /// Whether the uplink is currently reachable
    pub fn is_reachable(&self) -> bool {
        self.monitor.is_reachable()
    }

    /// Whether the bus session reported a broker connection
    pub fn is_connected(&self) -> bool {
        self.bus.is_connected()
    }

    /// Snapshot of gateway counters
    pub fn stats(&self) -> GatewayStats {
        self.stats.snapshot()
    }

    /// Stop the bus session, if any
    pub fn shutdown(&self) {
        info!("Gateway shutting down");
        self.bus.stop();
    }
}
