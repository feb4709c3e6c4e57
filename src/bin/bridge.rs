//! UDP Media Bridge
//!
//! Receives device audio and control traffic and republishes it over HTTP
//! and WebSocket.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use udp_media_bridge::{config::AppConfig, Bridge};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting UDP Media Bridge");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let network = &config.network;
    tracing::info!(
        "Ports: control udp/{} audio udp/{} http tcp/{} ws tcp/{}",
        network.control_port,
        network.audio_port,
        network.http_port,
        network.ws_port
    );
    tracing::info!("Received files stored in {}", config.storage.received_dir().display());

    let bridge = Bridge::new(config).context("Failed to initialize bridge")?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Ctrl-C received"),
            Err(e) => tracing::error!("Cannot listen for Ctrl-C: {}", e),
        }
        signal_token.cancel();
    });

    bridge.run(shutdown).await?;
    Ok(())
}
