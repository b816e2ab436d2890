//! Command-line entry point of the RFM69 gateway bridge.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use owlbridge_api::shutdown_signal;
use owlbridge_core::config::{env_vars, DEFAULT_CONFIG};
use owlbridge_core::{BridgeConfig, ConfigSource, HealthState};
use owlbridge_integrations::{BridgeService, InfluxDbWriter, MqttSession, PointWriter};

/// Time allowed for the offline message and DISCONNECT to reach the broker.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Owlbridge - decode RFM69 gateway traffic into InfluxDB, MQTT and Home Assistant.
#[derive(Parser, Debug)]
#[command(name = "owlbridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the default configuration and exit.
    #[arg(short, long = "default")]
    default: bool,

    /// Debug output (RUST_LOG takes precedence).
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.default {
        print!("{}", DEFAULT_CONFIG);
        return Ok(());
    }

    let source = ConfigSource::detect(args.config.as_deref());
    let config = BridgeConfig::load(&source).context("Failed to load configuration")?;

    init_logging(&config.main.log_level, args.verbose);
    source.log();
    run(config).await
}

fn init_logging(log_level: &str, verbose: bool) {
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let level = if verbose {
        "debug".to_string()
    } else {
        log_level.to_lowercase()
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .init();
    }
}

async fn run(config: BridgeConfig) -> Result<()> {
    info!(version = owlbridge_core::VERSION, "Starting owlbridge");

    let health = HealthState::new();
    let bind: SocketAddr = format!("{}:{}", config.main.api_host, config.main.api_port)
        .parse()
        .context("Invalid status endpoint address")?;

    let (stop_api, api_stopped) = oneshot::channel::<()>();
    let api_health = health.clone();
    let api = tokio::spawn(async move {
        let shutdown = async move {
            let _ = api_stopped.await;
        };
        if let Err(e) = owlbridge_api::run(bind, api_health, shutdown).await {
            error!(category = "api", "Status endpoint failed: {}", e);
        }
    });

    let writer: Option<Arc<dyn PointWriter>> = if config.influxdb.enabled {
        let writer = Arc::new(
            InfluxDbWriter::new(config.influxdb.clone())
                .context("Failed to create InfluxDB client")?,
        );
        tokio::select! {
            res = writer.ensure_database() => {
                res.context("InfluxDB bootstrap failed")?;
            }
            _ = shutdown_signal() => {
                let _ = stop_api.send(());
                let _ = api.await;
                return Ok(());
            }
        }
        Some(writer as Arc<dyn PointWriter>)
    } else {
        info!(category = "influxdb", "InfluxDB sink disabled");
        None
    };

    let MqttSession {
        publisher,
        inbound,
        task,
    } = MqttSession::start(&config, health.clone());

    let service = BridgeService::from_config(&config, Arc::new(publisher.clone()), writer)
        .context("Invalid MQTT route pattern")?;

    tokio::select! {
        _ = service.run(inbound, health.clone()) => {
            warn!("Message loop ended unexpectedly");
        }
        _ = shutdown_signal() => {}
    }
    health.set_loop_alive(false);

    service.announce(false).await;
    if let Err(e) = publisher.disconnect().await {
        warn!(category = "mqtt", "Failed to disconnect: {}", e);
    }
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await.is_err() {
        warn!(
            category = "mqtt",
            "Broker session did not close within {}s",
            SHUTDOWN_TIMEOUT.as_secs()
        );
    }

    let _ = stop_api.send(());
    let _ = api.await;

    info!("Shutdown complete");
    Ok(())
}
