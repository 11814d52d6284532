//! MQTT bus transport built on `rumqttc`
//!
//! Connecting only builds the client and spawns its event loop; the network
//! handshake happens on that task and is reported through the session's
//! [`BusEventSink`]. `rumqttc` keeps reconnecting for as long as the event
//! loop is polled, so a session survives broker restarts until the gateway
//! stops it.

use bytes::Bytes;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::bus::{BusEvent, BusEventSink, BusTransport, QoS};
use crate::config::BrokerConfig;
use crate::error::{GatewayError, Result};

/// Delay between event loop polls after a connection error
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Time a closing session gets to flush its DISCONNECT before it is aborted
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

/// Bus transport speaking MQTT 3.1.1 through `rumqttc`
#[derive(Debug, Clone)]
pub struct MqttTransport {
    runtime: Handle,
    retry_delay: Duration,
}

/// Live MQTT session
pub struct MqttSession {
    client: AsyncClient,
    event_loop: JoinHandle<()>,
}

impl MqttTransport {
    /// Create a transport that spawns event loops on `runtime`
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Create a transport bound to the runtime of the calling task
    pub fn from_current() -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| GatewayError::Runtime(e.to_string()))?;
        Ok(Self::new(runtime))
    }

    /// Set the delay between polls after a connection error
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

impl BusTransport for MqttTransport {
    type Session = MqttSession;

    fn connect(&self, config: &BrokerConfig, events: BusEventSink) -> Result<MqttSession> {
        let endpoint = config
            .endpoint()
            .map_err(|e| GatewayError::ConnectionFailed {
                broker: config.uri.clone(),
                reason: e.to_string(),
            })?;

        // rumqttc panics on sub-second keep-alives other than zero
        if !config.keep_alive.is_zero() && config.keep_alive < Duration::from_secs(1) {
            return Err(GatewayError::ConnectionFailed {
                broker: config.uri.clone(),
                reason: format!(
                    "keep-alive {:?} must be zero or at least one second",
                    config.keep_alive
                ),
            });
        }

        let mut options = MqttOptions::new(&config.client_id, &endpoint.host, endpoint.port);
        options.set_keep_alive(config.keep_alive);
        options.set_clean_session(true);
        if let Some(username) = &config.username {
            options.set_credentials(username, config.password.as_deref().unwrap_or_default());
        }

        let (client, event_loop) = AsyncClient::new(options, config.channel_capacity);
        debug!("Spawning MQTT event loop for {}", endpoint);
        let event_loop = self
            .runtime
            .spawn(drive_event_loop(event_loop, events, self.retry_delay));

        Ok(MqttSession { client, event_loop })
    }

    fn publish(&self, session: &MqttSession, topic: &str, payload: Bytes, qos: QoS) -> Result<()> {
        session
            .client
            .try_publish(topic, to_mqtt_qos(qos), false, payload.to_vec())
            .map_err(|e| GatewayError::PublishFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    fn disconnect(&self, session: MqttSession) {
        let MqttSession {
            client,
            mut event_loop,
        } = session;

        if let Err(e) = client.try_disconnect() {
            debug!("MQTT disconnect request not queued: {}", e);
        }

        self.runtime.spawn(async move {
            if tokio::time::timeout(DISCONNECT_GRACE, &mut event_loop)
                .await
                .is_err()
            {
                event_loop.abort();
            }
        });
    }
}

fn to_mqtt_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

/// Poll the client event loop and translate its notifications into bus events
async fn drive_event_loop(mut event_loop: EventLoop, events: BusEventSink, retry_delay: Duration) {
    let mut connected = false;

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected = true;
                events(BusEvent::Connected);
            }
            Ok(Event::Incoming(Packet::PubAck(ack))) => {
                events(BusEvent::Published { pkid: ack.pkid });
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                if connected {
                    connected = false;
                    events(BusEvent::Disconnected);
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                if connected {
                    events(BusEvent::Disconnected);
                }
                break;
            }
            Ok(event) => {
                trace!("MQTT event: {:?}", event);
            }
            Err(ConnectionError::RequestsDone) => {
                debug!("MQTT client dropped, stopping event loop");
                if connected {
                    events(BusEvent::Disconnected);
                }
                break;
            }
            Err(e) => {
                warn!("MQTT connection error: {}", e);
                if connected {
                    connected = false;
                    events(BusEvent::Disconnected);
                }
                events(BusEvent::Error {
                    reason: e.to_string(),
                });
                tokio::time::sleep(retry_delay).await;
            }
        }
    }
}
