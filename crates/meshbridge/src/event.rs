//! Mesh events and bus messages
//!
//! [`NetworkEvent`] is what the mesh stack hands to the gateway. It is a
//! tagged variant over the event kind; every kind carries the source element
//! address and the opcode of the operation it reports. [`TopicMessage`] is
//! what the gateway hands to the bus.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mesh access-layer opcode (1, 2 or 3 octets packed into a `u32`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Opcode(u32);

impl Opcode {
    /// Config AppKey Add
    pub const APP_KEY_ADD: Opcode = Opcode(0x00);
    /// Config Model Subscription Add
    pub const MODEL_SUB_ADD: Opcode = Opcode(0x801B);
    /// Config Model Subscription Delete
    pub const MODEL_SUB_DELETE: Opcode = Opcode(0x801C);
    /// Config Model App Bind
    pub const MODEL_APP_BIND: Opcode = Opcode(0x803D);
    /// Generic OnOff Get
    pub const GEN_ONOFF_GET: Opcode = Opcode(0x8201);
    /// Generic OnOff Set
    pub const GEN_ONOFF_SET: Opcode = Opcode(0x8202);
    /// Generic OnOff Set Unacknowledged
    pub const GEN_ONOFF_SET_UNACK: Opcode = Opcode(0x8203);
    /// Generic OnOff Status
    pub const GEN_ONOFF_STATUS: Opcode = Opcode(0x8204);

    /// Wrap a raw opcode value
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw opcode value
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Human-readable name for opcodes the gateway knows about
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::APP_KEY_ADD => "AppKeyAdd",
            Self::MODEL_SUB_ADD => "ModelSubAdd",
            Self::MODEL_SUB_DELETE => "ModelSubDelete",
            Self::MODEL_APP_BIND => "ModelAppBind",
            Self::GEN_ONOFF_GET => "GenericOnOffGet",
            Self::GEN_ONOFF_SET => "GenericOnOffSet",
            Self::GEN_ONOFF_SET_UNACK => "GenericOnOffSetUnack",
            Self::GEN_ONOFF_STATUS => "GenericOnOffStatus",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:04x})", name, self.0),
            None => write!(f, "0x{:04x}", self.0),
        }
    }
}

impl From<u32> for Opcode {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Operation-specific payload of a mesh event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpPayload {
    /// Nothing beyond the opcode
    #[default]
    Empty,
    /// Generic OnOff state
    OnOff {
        /// Present OnOff value
        present: u8,
    },
    /// Application key added to the node
    AppKeyAdd {
        /// Network key index
        net_idx: u16,
        /// Application key index
        app_idx: u16,
    },
    /// Application key bound to a model
    ModelAppBind {
        /// Element address
        element_addr: u16,
        /// Application key index
        app_idx: u16,
        /// Company identifier (0xFFFF for SIG models)
        company_id: u16,
        /// Model identifier
        model_id: u16,
    },
    /// Subscription address added to or removed from a model
    ModelSubscription {
        /// Element address
        element_addr: u16,
        /// Subscription address
        sub_addr: u16,
        /// Company identifier (0xFFFF for SIG models)
        company_id: u16,
        /// Model identifier
        model_id: u16,
    },
}

/// Common part of every mesh event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshMessage {
    /// Source element address
    pub source: u16,
    /// Operation reported by the event
    pub opcode: Opcode,
    /// Operation-specific data
    #[serde(default)]
    pub payload: OpPayload,
}

impl MeshMessage {
    /// Create a message
    pub fn new(source: u16, opcode: Opcode, payload: OpPayload) -> Self {
        Self {
            source,
            opcode,
            payload,
        }
    }

    /// Generic OnOff Status from `source` with the given present value
    pub fn onoff_status(source: u16, present: u8) -> Self {
        Self::new(source, Opcode::GEN_ONOFF_STATUS, OpPayload::OnOff { present })
    }
}

/// Event delivered by the mesh stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NetworkEvent {
    /// Local node state changed (configuration or client response)
    StateChange(MeshMessage),
    /// A remote node published its state
    Publish(MeshMessage),
    /// A client request timed out
    Timeout(MeshMessage),
    /// The mesh stack reported an error
    Error {
        /// Source element address
        source: u16,
        /// Operation that failed
        opcode: Opcode,
        /// Stack error code
        code: i32,
    },
}

impl NetworkEvent {
    /// Source element address
    pub fn source(&self) -> u16 {
        match self {
            NetworkEvent::StateChange(msg)
            | NetworkEvent::Publish(msg)
            | NetworkEvent::Timeout(msg) => msg.source,
            NetworkEvent::Error { source, .. } => *source,
        }
    }

    /// Opcode the event refers to
    pub fn opcode(&self) -> Opcode {
        match self {
            NetworkEvent::StateChange(msg)
            | NetworkEvent::Publish(msg)
            | NetworkEvent::Timeout(msg) => msg.opcode,
            NetworkEvent::Error { opcode, .. } => *opcode,
        }
    }

    /// Short name of the event kind (for logging)
    pub fn kind(&self) -> &'static str {
        match self {
            NetworkEvent::StateChange(_) => "state_change",
            NetworkEvent::Publish(_) => "publish",
            NetworkEvent::Timeout(_) => "timeout",
            NetworkEvent::Error { .. } => "error",
        }
    }
}

/// Topic and payload ready to be published on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMessage {
    topic: String,
    payload: Bytes,
}

impl TopicMessage {
    /// Create a message
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Topic the message is published under
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Message body
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Decode the payload as an ASCII decimal status value
    pub fn status(&self) -> Option<u8> {
        std::str::from_utf8(&self.payload).ok()?.parse().ok()
    }

    /// Split into topic and payload
    pub fn into_parts(self) -> (String, Bytes) {
        (self.topic, self.payload)
    }
}
