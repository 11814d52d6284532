//! Error types for gateway operations
//!
//! Nothing in the gateway is fatal to the process. These errors surface in
//! logs and counters; the bridge keeps running for subsequent events.

use thiserror::Error;

use crate::event::Opcode;

/// Main error type for gateway operations
#[derive(Error, Debug)]
pub enum GatewayError {
    // ===== Bus Errors =====
    /// No bus session exists when a publish is requested
    #[error("Bus transport unavailable, message for {topic} dropped")]
    TransportUnavailable {
        /// Topic of the dropped message
        topic: String,
    },

    /// Establishing the bus session failed
    #[error("Failed to connect to broker {broker}: {reason}")]
    ConnectionFailed {
        /// Broker endpoint
        broker: String,
        /// Failure reason
        reason: String,
    },

    /// The transport refused a publish request
    #[error("Publish to {topic} failed: {reason}")]
    PublishFailed {
        /// Topic of the failed message
        topic: String,
        /// Failure reason
        reason: String,
    },

    // ===== Mesh Event Errors =====
    /// Event could not be mapped to a bus message
    #[error("Malformed mesh event from 0x{address:04x}: {reason}")]
    MalformedEvent {
        /// Source element address
        address: u16,
        /// What was wrong with it
        reason: String,
    },

    /// Status value does not fit the single-digit payload
    #[error("Status value {value} out of range (max {max})")]
    StatusOutOfRange {
        /// Received value
        value: u8,
        /// Largest accepted value
        max: u8,
    },

    /// Opcode not recognized for the event kind
    #[error("Unknown opcode {0}")]
    UnknownOpcode(Opcode),

    // ===== Configuration Errors =====
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    // ===== General Errors =====
    /// No async runtime available for the bus transport
    #[error("Runtime unavailable: {0}")]
    Runtime(String),

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    /// Check if a later attempt could succeed without intervention
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            GatewayError::TransportUnavailable { .. }
                | GatewayError::ConnectionFailed { .. }
                | GatewayError::PublishFailed { .. }
        )
    }

    /// Get an error code for logging
    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::TransportUnavailable { .. } => "TRANSPORT_UNAVAILABLE",
            GatewayError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            GatewayError::PublishFailed { .. } => "PUBLISH_FAILED",
            GatewayError::MalformedEvent { .. } => "MALFORMED_EVENT",
            GatewayError::StatusOutOfRange { .. } => "STATUS_OUT_OF_RANGE",
            GatewayError::UnknownOpcode(_) => "UNKNOWN_OPCODE",
            GatewayError::InvalidConfig(_) => "INVALID_CONFIG",
            GatewayError::MissingConfig(_) => "MISSING_CONFIG",
            GatewayError::Runtime(_) => "RUNTIME_UNAVAILABLE",
            GatewayError::Io(_) => "IO_ERROR",
            GatewayError::Json(_) => "JSON_ERROR",
        }
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
