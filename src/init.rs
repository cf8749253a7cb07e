//! Initialization helpers for the application startup.

use crate::config::Config;
use crate::engine::DecisionService;
use crate::fetcher::create_fetcher;
use crate::resolver::IdentityResolver;
use crate::settings::SettingsStore;
use crate::stats::StatsCollector;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Sets up the tracing subscriber with the configured filters.
pub fn setup_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = config.logging.level.clone();

        // Connection-level noise from the HTTP stack unless asked for
        for noisy in ["hyper", "reqwest"] {
            if !filter.contains(noisy) {
                filter.push_str(&format!(",{}=warn", noisy));
            }
        }

        tracing_subscriber::EnvFilter::new(filter)
    });

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Builds the fetcher, resolver and decision service from config.
pub fn build_service(
    config: &Config,
    config_path: Option<PathBuf>,
    stats: Arc<StatsCollector>,
) -> Result<DecisionService> {
    let fetcher = create_fetcher(config, stats.clone())?;
    let resolver = Arc::new(IdentityResolver::new(fetcher, &config.cache, stats.clone()));
    let settings = SettingsStore::new(config.settings.clone(), config_path);
    info!(
        "Resolver caches: ttl {}s, capacity {}",
        config.cache.ttl_secs, config.cache.capacity
    );
    Ok(DecisionService::new(resolver, settings, stats))
}

/// Reloads settings every `interval_secs` (0 disables the timer) and whenever
/// the returned sender is signalled.
pub fn spawn_settings_reloader(store: Arc<SettingsStore>, interval_secs: u64) -> mpsc::Sender<()> {
    let (reload_tx, mut reload_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        let period = Duration::from_secs(interval_secs.max(1));
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick(), if interval_secs > 0 => {}
                msg = reload_rx.recv() => {
                    if msg.is_none() {
                        break;
                    }
                    info!("Settings reload triggered via API...");
                    interval.reset();
                }
            }
            if let Err(e) = store.reload().await {
                error!("Settings reload failed, keeping previous settings: {:#}", e);
            }
        }
    });

    reload_tx
}
