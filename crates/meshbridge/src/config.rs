//! Configuration types for the gateway
//!
//! The broker configuration is resolved once at startup and handed to the
//! bus connection manager, which reuses it for every (re)connect.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{GatewayError, Result};

/// Default MQTT broker port
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Default MQTT client identifier
pub const DEFAULT_CLIENT_ID: &str = "meshbridge";

/// Default keep-alive interval
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;

/// Default capacity of the MQTT client request channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Main configuration for the gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Broker connection settings
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Reachability probe settings
    #[serde(default)]
    pub probe: ProbeConfig,
}

impl GatewayConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse configuration from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can be used to connect
    pub fn validate(&self) -> Result<()> {
        self.broker.endpoint()?;
        if self.broker.client_id.is_empty() {
            return Err(GatewayError::MissingConfig("broker.client_id".to_string()));
        }
        if self.broker.password.is_some() && self.broker.username.is_none() {
            return Err(GatewayError::InvalidConfig(
                "broker.password set without broker.username".to_string(),
            ));
        }
        if !self.broker.keep_alive.is_zero() && self.broker.keep_alive < Duration::from_secs(1) {
            return Err(GatewayError::InvalidConfig(
                "broker.keep_alive must be zero or at least one second".to_string(),
            ));
        }
        if self.broker.channel_capacity == 0 {
            return Err(GatewayError::InvalidConfig(
                "broker.channel_capacity must be positive".to_string(),
            ));
        }
        if self.probe.interval.is_zero() {
            return Err(GatewayError::InvalidConfig(
                "probe.interval must be positive".to_string(),
            ));
        }
        if self.probe.timeout.is_zero() {
            return Err(GatewayError::InvalidConfig(
                "probe.timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// MQTT broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker URI (`mqtt://host:port`, `tcp://host:port` or `host:port`)
    pub uri: String,

    /// MQTT client identifier
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Username for authentication
    #[serde(default)]
    pub username: Option<String>,

    /// Password for authentication
    #[serde(default)]
    pub password: Option<String>,

    /// Keep-alive interval
    #[serde(with = "humantime_serde", default = "default_keep_alive")]
    pub keep_alive: Duration,

    /// Capacity of the client request channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

fn default_keep_alive() -> Duration {
    Duration::from_secs(DEFAULT_KEEP_ALIVE_SECS)
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            uri: format!("mqtt://localhost:{}", DEFAULT_MQTT_PORT),
            client_id: default_client_id(),
            username: None,
            password: None,
            keep_alive: default_keep_alive(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Host and port of the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    /// Host name or address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl std::fmt::Display for BrokerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl BrokerConfig {
    /// Parse the broker URI into host and port
    pub fn endpoint(&self) -> Result<BrokerEndpoint> {
        let uri = self.uri.trim();
        let rest = match uri.split_once("://") {
            Some(("mqtt" | "tcp", rest)) => rest,
            Some((scheme, _)) => {
                return Err(GatewayError::InvalidConfig(format!(
                    "unsupported broker scheme '{}'",
                    scheme
                )))
            }
            None => uri,
        };
        let rest = rest.trim_end_matches('/');
        if rest.is_empty() {
            return Err(GatewayError::MissingConfig("broker.uri".to_string()));
        }

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    GatewayError::InvalidConfig(format!("invalid broker port '{}'", port))
                })?;
                (host, port)
            }
            None => (rest, DEFAULT_MQTT_PORT),
        };
        if host.is_empty() {
            return Err(GatewayError::InvalidConfig(format!(
                "broker uri '{}' has no host",
                self.uri
            )));
        }

        Ok(BrokerEndpoint {
            host: host.to_string(),
            port,
        })
    }
}

/// Reachability probe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Time between probes
    #[serde(with = "humantime_serde", default = "default_probe_interval")]
    pub interval: Duration,

    /// Time after which a probe counts as failed
    #[serde(with = "humantime_serde", default = "default_probe_timeout")]
    pub timeout: Duration,
}

fn default_probe_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(2)
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval: default_probe_interval(),
            timeout: default_probe_timeout(),
        }
    }
}

/// Builder for GatewayConfig
#[derive(Debug, Default)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: GatewayConfig) -> Self {
        Self { config }
    }

    /// Set broker URI
    pub fn broker_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.broker.uri = uri.into();
        self
    }

    /// Set MQTT client identifier
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.broker.client_id = client_id.into();
        self
    }

    /// Set broker credentials
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.broker.username = Some(username.into());
        self.config.broker.password = Some(password.into());
        self
    }

    /// Set broker username only
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.broker.username = Some(username.into());
        self
    }

    /// Set keep-alive interval
    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.config.broker.keep_alive = keep_alive;
        self
    }

    /// Set reachability probe interval
    pub fn probe_interval(mut self, interval: Duration) -> Self {
        self.config.probe.interval = interval;
        self
    }

    /// Build the configuration
    pub fn build(self) -> GatewayConfig {
        self.config
    }
}

// Custom serde module for Duration with humantime
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.broker.client_id, DEFAULT_CLIENT_ID);
        assert_eq!(config.broker.keep_alive, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = GatewayConfigBuilder::new()
            .broker_uri("mqtt://broker.local:8883")
            .credentials("gateway", "secret")
            .probe_interval(Duration::from_secs(1))
            .build();

        assert_eq!(config.broker.username.as_deref(), Some("gateway"));
        assert_eq!(config.probe.interval, Duration::from_secs(1));
        assert_eq!(config.broker.endpoint().unwrap().port, 8883);
    }

    #[test]
    fn test_endpoint_parsing() {
        let mut broker = BrokerConfig::default();

        broker.uri = "mqtt://192.168.1.10:1884".to_string();
        let endpoint = broker.endpoint().unwrap();
        assert_eq!(endpoint.host, "192.168.1.10");
        assert_eq!(endpoint.port, 1884);

        broker.uri = "tcp://broker".to_string();
        assert_eq!(broker.endpoint().unwrap().port, DEFAULT_MQTT_PORT);

        broker.uri = "broker.local:1883/".to_string();
        assert_eq!(broker.endpoint().unwrap().to_string(), "broker.local:1883");
    }

    #[test]
    fn test_endpoint_rejects_bad_uris() {
        let mut broker = BrokerConfig::default();

        broker.uri = "ws://broker:80".to_string();
        assert!(matches!(
            broker.endpoint(),
            Err(GatewayError::InvalidConfig(_))
        ));

        broker.uri = "mqtt://broker:99999".to_string();
        assert!(broker.endpoint().is_err());

        broker.uri = "mqtt://".to_string();
        assert!(matches!(broker.endpoint(), Err(GatewayError::MissingConfig(_))));

        broker.uri = "mqtt://:1883".to_string();
        assert!(broker.endpoint().is_err());
    }

    #[test]
    fn test_from_json() {
        let config = GatewayConfig::from_json(
            r#"{
                "broker": { "uri": "mqtt://10.0.0.2", "username": "u", "password": "p", "keep_alive": "30s" },
                "probe": { "interval": "10s" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.broker.keep_alive, Duration::from_secs(30));
        assert_eq!(config.broker.client_id, DEFAULT_CLIENT_ID);
        assert_eq!(config.probe.interval, Duration::from_secs(10));
        assert_eq!(config.probe.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_zero_probe_durations_are_rejected() {
        let config = GatewayConfigBuilder::new()
            .probe_interval(Duration::ZERO)
            .build();
        assert!(matches!(
            config.validate(),
            Err(GatewayError::InvalidConfig(_))
        ));

        let result = GatewayConfig::from_json(r#"{ "probe": { "timeout": "0s" } }"#);
        assert!(matches!(result, Err(GatewayError::InvalidConfig(_))));
    }

    #[test]
    fn test_subsecond_keep_alive_is_rejected() {
        let config = GatewayConfigBuilder::new()
            .keep_alive(Duration::from_millis(500))
            .build();
        assert!(config.validate().is_err());

        let config = GatewayConfigBuilder::new().keep_alive(Duration::ZERO).build();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_password_without_username_is_rejected() {
        let result = GatewayConfig::from_json(r#"{ "broker": { "uri": "broker", "password": "p" } }"#);
        assert!(matches!(result, Err(GatewayError::InvalidConfig(_))));
    }
}
