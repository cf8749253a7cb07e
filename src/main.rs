use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::info;

use geo_nope::api::start_api_server;
use geo_nope::config::Config;
use geo_nope::init::{build_service, setup_logging, spawn_settings_reloader};
use geo_nope::stats::StatsCollector;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load Config
    let config_path = PathBuf::from(std::env::args().nth(1).unwrap_or("config.toml".to_string()));
    let config_exists = config_path.exists();
    let config = if config_exists {
        Config::load(&config_path).await?
    } else {
        Config::default()
    };

    // 2. Setup Logging
    setup_logging(&config);
    info!("Starting geo-nope...");
    if !config_exists {
        info!("Config file not found, using defaults.");
    }

    // 3. Init Stats
    let stats = StatsCollector::new();
    if config.stats.enable {
        stats.spawn_logger(config.stats.log_interval_seconds);
    }

    // 4. Build Fetcher, Resolver & Decision Service
    let service = build_service(&config, config_exists.then_some(config_path), stats.clone())?;
    let settings = service.settings().snapshot();
    if settings.is_lookup_disabled() {
        info!("No credential or relay configured; every item will be allowed.");
    }

    // 5. Spawn Settings Reloader
    let reload_tx =
        spawn_settings_reloader(service.settings().clone(), config.updates.settings_reload_secs);

    // 6. Start API Server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid host/port")?;

    // 7. Graceful Shutdown
    tokio::select! {
        res = start_api_server(service, stats, reload_tx, addr) => res?,
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    Ok(())
}
