//! Liquidation Sentinel
//!
//! Watches a lending protocol for positions that fall below a health factor
//! of 1.0 and posts alerts to a Telegram chat.
//! Features:
//! - Startup backfill, then WebSocket new-head processing
//! - Reorg-aware block cursor with persisted state
//! - Per-(user, asset) alert cooldown

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sentinel_api::TelegramClient;
use sentinel_chain::{AaveProtocolClient, RpcChainFeed};
use sentinel_core::{ConfigHandle, Monitor, MonitorConfig, MonitorStats, Notifier};

/// Environment variable names.
mod env {
    pub const CONFIG_PATH: &str = "SENTINEL_CONFIG";
    pub const BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
}

const DEFAULT_CONFIG_PATH: &str = "sentinel.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let config = load_config()?;
    config.log_config();

    info!("Starting Liquidation Sentinel");

    let config = ConfigHandle::new(config);
    let settings = config.current();

    // Chain access
    let feed = Arc::new(
        RpcChainFeed::new(&settings.rpc.http_url, &settings.rpc.ws_url)
            .context("invalid RPC endpoint")?,
    );
    match feed.chain_id().await {
        Ok(chain_id) => info!(chain_id = chain_id, "Connected to chain"),
        Err(e) => error!(error = %e, "Chain id lookup failed, continuing"),
    }
    match feed.health_check().await {
        Ok(true) => {}
        Ok(false) => warn!("RPC endpoint reports block 0, node may still be syncing"),
        Err(e) => error!(error = %e, "RPC health check failed, continuing"),
    }

    let protocol = Arc::new(
        AaveProtocolClient::new(
            &settings.rpc.http_url,
            settings.protocol.pool,
            settings.protocol.data_provider,
        )
        .context("invalid protocol client settings")?,
    );

    // Alert dispatch
    let stats = Arc::new(MonitorStats::new());
    let (notifier, dispatcher) =
        Notifier::spawn(Arc::new(TelegramClient::new()), config.clone(), stats.clone());

    let monitor = Monitor::new(config, feed, protocol, notifier, stats);

    info!("Bootstrapping...");
    monitor.bootstrap().await?;

    // Ctrl-C stops the loop between blocks
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    info!("Starting main loop...");
    monitor.run(shutdown_rx).await?;

    // Flush pending alerts
    drop(monitor);
    if let Err(e) = dispatcher.await {
        error!(error = %e, "Alert dispatcher panicked");
    }

    info!("Sentinel stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sentinel_core=debug,sentinel_chain=debug"));

    let json = std::env::var(env::LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

/// Load the config file, apply environment overrides and validate.
fn load_config() -> Result<MonitorConfig> {
    let path = std::env::var(env::CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let mut config = MonitorConfig::from_file(&path)
        .with_context(|| format!("failed to load configuration from {path}"))?;

    if let Ok(token) = std::env::var(env::BOT_TOKEN) {
        if !token.trim().is_empty() {
            config.notifier.bot_token = token;
        }
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}
