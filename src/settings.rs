//! Live-reloadable settings snapshot.

use crate::config::{Config, Settings};
use anyhow::Result;
use arc_swap::ArcSwap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub struct SettingsStore {
    current: ArcSwap<Settings>,
    source: Option<PathBuf>,
}

impl SettingsStore {
    pub fn new(settings: Settings, source: Option<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            current: ArcSwap::from_pointee(settings),
            source,
        })
    }

    /// One snapshot per decision batch; later swaps do not affect it.
    pub fn snapshot(&self) -> Arc<Settings> {
        self.current.load_full()
    }

    pub fn replace(&self, settings: Settings) {
        self.current.store(Arc::new(settings));
    }

    /// Re-reads the `[settings]` table from the config file, if there is one.
    pub async fn reload(&self) -> Result<bool> {
        let Some(path) = &self.source else {
            return Ok(false);
        };
        if !path.exists() {
            return Ok(false);
        }
        let config = Config::load(path).await?;
        self.replace(config.settings);
        info!("Settings reloaded from {}", path.display());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{normalize_countries, PlaylistPolicy};

    #[test]
    fn test_snapshot_is_stable_across_replace() {
        let store = SettingsStore::new(Settings::default(), None);
        let before = store.snapshot();

        store.replace(Settings {
            blocked_countries: normalize_countries(["US"]),
            playlist_policy: PlaylistPolicy::Owner,
            ..Settings::default()
        });

        assert!(before.blocked_countries.is_empty());
        let after = store.snapshot();
        assert!(after.is_country_blocked("US"));
        assert_eq!(after.playlist_policy, PlaylistPolicy::Owner);
    }

    #[tokio::test]
    async fn test_reload_without_source_is_noop() {
        let store = SettingsStore::new(Settings::default(), None);
        assert!(!store.reload().await.unwrap());
    }

    #[tokio::test]
    async fn test_reload_from_file() {
        let path = std::env::temp_dir().join(format!("geo-nope-settings-{}.toml", std::process::id()));
        tokio::fs::write(
            &path,
            "[settings]\ncredential = \"k\"\nblocked_countries = \"de\"\n",
        )
        .await
        .unwrap();

        let store = SettingsStore::new(Settings::default(), Some(path.clone()));
        assert!(store.reload().await.unwrap());
        let snap = store.snapshot();
        assert!(snap.has_credential());
        assert!(snap.is_country_blocked("DE"));

        let _ = tokio::fs::remove_file(&path).await;
    }
}
