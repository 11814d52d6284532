//! Meshbridge Node - mesh-to-MQTT gateway runner
//!
//! This binary runs the gateway on a host:
//! - Mesh events arrive as JSON lines on stdin (one `NetworkEvent` per line)
//! - Uplink reachability comes from a periodic TCP probe of the broker
//! - Status messages are published to the configured MQTT broker

mod feed;
mod probe;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use meshbridge::{Gateway, GatewayConfig, GatewayConfigBuilder, MqttTransport};

#[derive(Parser, Debug)]
#[command(name = "meshbridge-node")]
#[command(about = "Republish Bluetooth mesh onoff status on MQTT")]
struct Args {
    /// JSON configuration file
    #[arg(long, short, env = "MESHBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// MQTT broker URI (overrides the configuration file)
    #[arg(long, env = "MQTT_BROKER_URI")]
    broker: Option<String>,

    /// MQTT username
    #[arg(long, env = "MQTT_USERNAME")]
    username: Option<String>,

    /// MQTT password
    #[arg(long, env = "MQTT_PASSWORD")]
    password: Option<String>,

    /// MQTT client identifier
    #[arg(long, env = "MQTT_CLIENT_ID")]
    client_id: Option<String>,

    /// Time between reachability probes (e.g. "5s")
    #[arg(long, value_parser = humantime::parse_duration)]
    probe_interval: Option<Duration>,

    /// Enable verbose logging
    #[arg(long, short)]
    verbose: bool,
}

/// Merge the configuration file with command-line overrides
fn resolve_config(args: &Args) -> anyhow::Result<GatewayConfig> {
    let base = match &args.config {
        Some(path) => GatewayConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => GatewayConfig::default(),
    };

    let mut builder = GatewayConfigBuilder::from_config(base);
    if let Some(uri) = &args.broker {
        builder = builder.broker_uri(uri);
    }
    if let Some(client_id) = &args.client_id {
        builder = builder.client_id(client_id);
    }
    if let Some(username) = &args.username {
        builder = builder.username(username);
    }
    if let Some(interval) = args.probe_interval {
        builder = builder.probe_interval(interval);
    }

    let mut config = builder.build();
    if let Some(password) = &args.password {
        config.broker.password = Some(password.clone());
    }
    config.validate().context("invalid gateway configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging on stderr; stdin/stdout belong to the event feed
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = resolve_config(&args)?;
    let endpoint = config.broker.endpoint()?;
    info!(
        "Starting meshbridge {} for broker {} (auth: {})",
        meshbridge::VERSION,
        endpoint,
        config.broker.username.is_some()
    );

    let transport = MqttTransport::from_current()?;
    let gateway = Gateway::try_new(&config, transport)?;

    let probe = tokio::spawn(probe::run(
        endpoint,
        config.probe.clone(),
        gateway.reachability_listener(),
    ));
    let feed = tokio::spawn(feed::run(tokio::io::stdin(), gateway.mesh_handler()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
        result = feed => match result {
            Ok(Ok(count)) => info!("Event feed closed after {} events", count),
            Ok(Err(e)) => warn!("Event feed failed: {:#}", e),
            Err(e) => warn!("Event feed task failed: {}", e),
        },
    }

    probe.abort();
    gateway.shutdown();

    let stats = gateway.stats();
    info!(
        "Published {} messages, dropped {}, malformed events {}, sessions {}",
        stats.messages_published, stats.messages_dropped, stats.malformed_events, stats.connects
    );

    // Let the MQTT event loop flush its DISCONNECT
    tokio::time::sleep(Duration::from_millis(250)).await;
    Ok(())
}
