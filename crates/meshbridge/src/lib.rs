//! Bluetooth Mesh to MQTT Gateway
//!
//! This crate republishes onoff status events from a Bluetooth mesh network
//! as MQTT messages, and starts or stops the MQTT client as the uplink
//! network comes and goes.
//!
//! # Architecture
//!
//! The gateway is built from three components wired together by
//! [`Gateway`]:
//!
//! 1. **Reachability** - [`ReachabilityMonitor`] tracks whether the uplink is
//!    usable and notifies subscribers on transitions
//! 2. **Bus lifecycle** - [`BusConnectionManager`] owns the single MQTT
//!    session, started on Up and stopped on Down
//! 3. **Translation** - [`EventTranslator`] maps mesh events to
//!    `ble_mesh/<addr>` topics and forwards them to the bus
//!
//! The mesh stack and the link driver are external collaborators. They call
//! into the gateway through [`MeshEventHandler`] and
//! [`ReachabilityListener`]; the bus client sits behind [`BusTransport`],
//! implemented for MQTT by [`MqttTransport`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use meshbridge::{Gateway, GatewayConfigBuilder, MqttTransport, NetworkEvent, MeshMessage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfigBuilder::new()
//!         .broker_uri("mqtt://localhost:1883")
//!         .build();
//!     let gateway = Gateway::new(&config, MqttTransport::from_current()?);
//!
//!     // Link driver reports connectivity
//!     gateway.reachability_listener().on_transport_status(true);
//!
//!     // Mesh stack reports a node status: published to ble_mesh/0005 as "1"
//!     gateway
//!         .mesh_handler()
//!         .on_network_event(NetworkEvent::Publish(MeshMessage::onoff_status(0x0005, 1)));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Delivery
//!
//! Publishing is best effort: messages produced while no MQTT session exists
//! are dropped and counted, never queued. With a session, messages go out with
//! QoS 1 and the gateway does not wait for the broker's acknowledgement.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bridge;
pub mod bus;
pub mod config;
pub mod error;
pub mod event;
pub mod mqtt;
pub mod reachability;
pub mod stats;
pub mod translator;

pub use bridge::Gateway;
pub use bus::{
    BusConnectionManager, BusEvent, BusEventSink, BusTransport, MessageSink, QoS, PUBLISH_QOS,
};
pub use config::{
    BrokerConfig, BrokerEndpoint, GatewayConfig, GatewayConfigBuilder, ProbeConfig,
    DEFAULT_MQTT_PORT,
};
pub use error::{GatewayError, Result};
pub use event::{MeshMessage, NetworkEvent, OpPayload, Opcode, TopicMessage};
pub use mqtt::{MqttSession, MqttTransport};
pub use reachability::{
    ReachabilityListener, ReachabilityMonitor, ReachabilityState, StatusCallback,
};
pub use stats::GatewayStats;
pub use translator::{
    encode_status, topic_for, EventTranslator, MeshEventHandler, MAX_STATUS_VALUE, TOPIC_PREFIX,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
