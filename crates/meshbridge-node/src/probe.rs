//! TCP reachability probe
//!
//! Stands in for the link driver on a host: the uplink counts as reachable
//! while a TCP connection to the broker endpoint can be opened within the
//! probe timeout. Every probe result is reported; the monitor collapses
//! repeats.

use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::time::MissedTickBehavior;
use tracing::trace;

use meshbridge::{BrokerEndpoint, ProbeConfig, ReachabilityListener};

/// Try to open a TCP connection to the endpoint
pub async fn probe_once(endpoint: &BrokerEndpoint, timeout: std::time::Duration) -> bool {
    let connect = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
    matches!(tokio::time::timeout(timeout, connect).await, Ok(Ok(_)))
}

/// Probe forever, reporting each result to `listener`
pub async fn run(
    endpoint: BrokerEndpoint,
    config: ProbeConfig,
    listener: Arc<dyn ReachabilityListener>,
) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let reachable = probe_once(&endpoint, config.timeout).await;
        trace!("Probe {}: reachable={}", endpoint, reachable);
        listener.on_transport_status(reachable);
    }
}
