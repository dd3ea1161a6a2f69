use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use relay_server::ServerConfig;
use relay_telemetry::{LogFormat, TelemetryConfig};

/// Realtime message relay: fans direct and group messages out to connected
/// WebSocket clients.
#[derive(Debug, Parser)]
#[command(name = "relay", version)]
struct Args {
    /// JSON config file merged over the built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Bind host (overrides config and RELAY_HOST).
    #[arg(long)]
    host: Option<String>,
    /// Listen port (overrides config and RELAY_PORT).
    #[arg(long, short)]
    port: Option<u16>,
    /// Default log level; RUST_LOG takes precedence.
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
    /// Log output format: json or pretty.
    #[arg(long, default_value = "json")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let telemetry = relay_telemetry::init_telemetry(TelemetryConfig {
        log_level: args.log_level,
        format: args.log_format,
        ..TelemetryConfig::default()
    });

    let mut config = ServerConfig::load(args.config.as_deref()).context("loading config")?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.validate().context("validating config")?;

    tracing::info!(
        host = %config.host,
        port = config.port,
        max_send_queue = config.max_send_queue,
        "starting relay"
    );

    let handle = relay_server::start(config, telemetry.metrics())
        .await
        .context("starting server")?;

    tracing::info!(port = handle.port(), "relay ready");

    tokio::signal::ctrl_c()
        .await
        .context("listening for ctrl+c")?;

    tracing::info!("shutting down");
    handle.shutdown().await;
    Ok(())
}
