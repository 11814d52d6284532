//! Mesh event translation
//!
//! Maps mesh-stack events to bus messages:
//!
//! | Event kind | Opcode | Result |
//! |------------|--------|--------|
//! | Publish | Generic OnOff Status | `ble_mesh/<addr>` / `"<status>"` |
//! | Publish | anything else | malformed, dropped |
//! | StateChange | any | logged only |
//! | Timeout / Error | any | logged only |
//!
//! The address is rendered as four lowercase hex digits and the status as a
//! single ASCII decimal digit. Status values that do not fit one digit are
//! rejected rather than truncated.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::bus::MessageSink;
use crate::error::{GatewayError, Result};
use crate::event::{MeshMessage, NetworkEvent, OpPayload, Opcode, TopicMessage};
use crate::stats::{GatewayStats, StatsCounters};

/// Prefix of every published topic
pub const TOPIC_PREFIX: &str = "ble_mesh";

/// Largest status value that fits the single-digit payload
pub const MAX_STATUS_VALUE: u8 = 9;

/// Receives events from the mesh-stack collaborator
pub trait MeshEventHandler: Send + Sync {
    /// Handle one event; never blocks
    fn on_network_event(&self, event: NetworkEvent);
}

/// Build the topic for a source element address
pub fn topic_for(address: u16) -> String {
    format!("{}/{:04x}", TOPIC_PREFIX, address)
}

/// Encode a status value as its single-digit ASCII payload
pub fn encode_status(value: u8) -> Result<Bytes> {
    if value > MAX_STATUS_VALUE {
        return Err(GatewayError::StatusOutOfRange {
            value,
            max: MAX_STATUS_VALUE,
        });
    }
    Ok(Bytes::from(value.to_string()))
}

/// Stateless mapper from mesh events to bus messages
pub struct EventTranslator {
    sink: Arc<dyn MessageSink>,
    stats: Arc<StatsCounters>,
}

impl EventTranslator {
    /// Create a translator forwarding to `sink`
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self::with_stats(sink, Arc::new(StatsCounters::default()))
    }

    pub(crate) fn with_stats(sink: Arc<dyn MessageSink>, stats: Arc<StatsCounters>) -> Self {
        Self { sink, stats }
    }

    /// Map an event to a bus message
    ///
    /// Pure mapping: returns `Ok(None)` for events that are not forwarded and
    /// an error for publish events that cannot be mapped.
    pub fn translate(&self, event: &NetworkEvent) -> Result<Option<TopicMessage>> {
        match event {
            NetworkEvent::Publish(msg) => translate_publish(msg).map(Some),
            NetworkEvent::StateChange(_) | NetworkEvent::Timeout(_) | NetworkEvent::Error { .. } => {
                Ok(None)
            }
        }
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> GatewayStats {
        self.stats.snapshot()
    }
}

impl MeshEventHandler for EventTranslator {
    fn on_network_event(&self, event: NetworkEvent) {
        match self.translate(&event) {
            Ok(Some(message)) => {
                info!(
                    "addr: {:04x}, status: {}",
                    event.source(),
                    String::from_utf8_lossy(message.payload())
                );
                debug!("Forwarding {} to {}", event.kind(), message.topic());
                let (topic, payload) = message.into_parts();
                self.sink.publish(&topic, payload);
            }
            Ok(None) => {
                log_unforwarded(&event);
                StatsCounters::incr(&self.stats.events_ignored);
            }
            Err(e) => {
                warn!("Dropping mesh event: {} [{}]", e, e.error_code());
                StatsCounters::incr(&self.stats.malformed_events);
            }
        }
    }
}

impl std::fmt::Debug for EventTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTranslator").finish_non_exhaustive()
    }
}

fn translate_publish(msg: &MeshMessage) -> Result<TopicMessage> {
    if msg.opcode != Opcode::GEN_ONOFF_STATUS {
        return Err(GatewayError::UnknownOpcode(msg.opcode));
    }

    let OpPayload::OnOff { present } = &msg.payload else {
        return Err(GatewayError::MalformedEvent {
            address: msg.source,
            reason: format!("{} without onoff state", msg.opcode),
        });
    };

    let payload = encode_status(*present)?;
    Ok(TopicMessage::new(topic_for(msg.source), payload))
}

fn log_unforwarded(event: &NetworkEvent) {
    match event {
        NetworkEvent::StateChange(msg) => log_state_change(msg),
        NetworkEvent::Timeout(msg) => {
            info!(
                "Mesh request timed out: addr=0x{:04x}, opcode={}",
                msg.source, msg.opcode
            );
        }
        NetworkEvent::Error {
            source,
            opcode,
            code,
        } => {
            warn!(
                "Mesh stack error: addr=0x{:04x}, opcode={}, code={}",
                source, opcode, code
            );
        }
        NetworkEvent::Publish(_) => {}
    }
}

fn log_state_change(msg: &MeshMessage) {
    match (&msg.opcode, &msg.payload) {
        (&Opcode::APP_KEY_ADD, OpPayload::AppKeyAdd { net_idx, app_idx }) => {
            info!(
                "AppKey added: net_idx=0x{:04x}, app_idx=0x{:04x}",
                net_idx, app_idx
            );
        }
        (
            &Opcode::MODEL_APP_BIND,
            OpPayload::ModelAppBind {
                element_addr,
                app_idx,
                company_id,
                model_id,
            },
        ) => {
            info!(
                "Model app bound: elem_addr=0x{:04x}, app_idx=0x{:04x}, cid=0x{:04x}, mod_id=0x{:04x}",
                element_addr, app_idx, company_id, model_id
            );
        }
        (
            &(Opcode::MODEL_SUB_ADD | Opcode::MODEL_SUB_DELETE),
            OpPayload::ModelSubscription {
                element_addr,
                sub_addr,
                company_id,
                model_id,
            },
        ) => {
            let action = if msg.opcode == Opcode::MODEL_SUB_ADD {
                "added"
            } else {
                "deleted"
            };
            info!(
                "Model subscription {}: elem_addr=0x{:04x}, sub_addr=0x{:04x}, cid=0x{:04x}, mod_id=0x{:04x}",
                action, element_addr, sub_addr, company_id, model_id
            );
        }
        (&(Opcode::GEN_ONOFF_GET | Opcode::GEN_ONOFF_SET), OpPayload::OnOff { present }) => {
            info!(
                "{} response from 0x{:04x}: onoff {}",
                msg.opcode, msg.source, present
            );
        }
        _ => {
            debug!(
                "Ignoring state change from 0x{:04x}: opcode={}",
                msg.source, msg.opcode
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        published: Mutex<Vec<(String, Bytes)>>,
    }

    impl MessageSink for RecordingSink {
        fn publish(&self, topic: &str, payload: Bytes) {
            self.published.lock().push((topic.to_string(), payload));
        }
    }

    fn translator() -> (EventTranslator, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (EventTranslator::new(sink.clone()), sink)
    }

    #[test]
    fn test_topic_format() {
        assert_eq!(topic_for(0x1A2B), "ble_mesh/1a2b");
        assert_eq!(topic_for(0x0005), "ble_mesh/0005");
        assert_eq!(topic_for(0xFFFF), "ble_mesh/ffff");
    }

    #[test]
    fn test_publish_maps_to_topic_message() {
        let (translator, sink) = translator();
        translator.on_network_event(NetworkEvent::Publish(MeshMessage::onoff_status(0x1A2B, 1)));

        assert_eq!(
            *sink.published.lock(),
            vec![("ble_mesh/1a2b".to_string(), Bytes::from_static(b"1"))]
        );
    }

    #[test]
    fn test_status_round_trip() {
        let (translator, _sink) = translator();
        for status in [0u8, 1] {
            let event = NetworkEvent::Publish(MeshMessage::onoff_status(0x0001, status));
            let message = translator.translate(&event).unwrap().unwrap();
            assert_eq!(message.status(), Some(status));
        }
    }

    #[test]
    fn test_app_key_add_state_change_is_not_forwarded() {
        let (translator, sink) = translator();
        translator.on_network_event(NetworkEvent::StateChange(MeshMessage::new(
            0x0001,
            Opcode::APP_KEY_ADD,
            OpPayload::AppKeyAdd {
                net_idx: 0,
                app_idx: 0,
            },
        )));

        assert!(sink.published.lock().is_empty());
        assert_eq!(translator.stats().events_ignored, 1);
    }

    #[test]
    fn test_state_change_with_status_opcode_is_not_forwarded() {
        let (translator, sink) = translator();
        let event = NetworkEvent::StateChange(MeshMessage::onoff_status(0x0002, 1));
        assert_eq!(translator.translate(&event).unwrap(), None);

        translator.on_network_event(event);
        assert!(sink.published.lock().is_empty());
    }

    #[test]
    fn test_translate_has_no_side_effects() {
        let (translator, sink) = translator();
        let events = [
            NetworkEvent::Publish(MeshMessage::onoff_status(0x0001, 1)),
            NetworkEvent::Timeout(MeshMessage::new(0x0001, Opcode::GEN_ONOFF_GET, OpPayload::Empty)),
            NetworkEvent::Publish(MeshMessage::onoff_status(0x0001, 10)),
        ];
        for event in &events {
            let _ = translator.translate(event);
        }

        assert!(sink.published.lock().is_empty());
        assert_eq!(translator.stats(), GatewayStats::default());
    }

    #[test]
    fn test_timeout_and_error_are_not_forwarded() {
        let (translator, sink) = translator();
        translator.on_network_event(NetworkEvent::Timeout(MeshMessage::new(
            0x0003,
            Opcode::GEN_ONOFF_GET,
            OpPayload::Empty,
        )));
        translator.on_network_event(NetworkEvent::Error {
            source: 0x0003,
            opcode: Opcode::GEN_ONOFF_SET,
            code: -116,
        });

        assert!(sink.published.lock().is_empty());
        assert_eq!(translator.stats().events_ignored, 2);
    }

    #[test]
    fn test_publish_with_unknown_opcode_is_malformed() {
        let (translator, sink) = translator();
        let event = NetworkEvent::Publish(MeshMessage::new(
            0x0004,
            Opcode::new(0x8250),
            OpPayload::OnOff { present: 1 },
        ));

        assert!(matches!(
            translator.translate(&event),
            Err(GatewayError::UnknownOpcode(_))
        ));
        translator.on_network_event(event);
        assert!(sink.published.lock().is_empty());
        assert_eq!(translator.stats().malformed_events, 1);
    }

    #[test]
    fn test_publish_without_onoff_payload_is_malformed() {
        let (translator, _sink) = translator();
        let event = NetworkEvent::Publish(MeshMessage::new(
            0x0004,
            Opcode::GEN_ONOFF_STATUS,
            OpPayload::Empty,
        ));
        assert!(matches!(
            translator.translate(&event),
            Err(GatewayError::MalformedEvent { address: 0x0004, .. })
        ));
    }

    #[test]
    fn test_multi_digit_status_is_rejected() {
        let (translator, sink) = translator();
        translator.on_network_event(NetworkEvent::Publish(MeshMessage::onoff_status(0x0006, 10)));

        assert!(sink.published.lock().is_empty());
        assert_eq!(translator.stats().malformed_events, 1);
        assert!(encode_status(9).is_ok());
        assert!(matches!(
            encode_status(42),
            Err(GatewayError::StatusOutOfRange { value: 42, max: 9 })
        ));
    }
}
