use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use tokio::fs;

/// Upstream batch-size ceiling, also the page size for playlist items.
pub const MAX_BATCH: usize = 50;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub updates: UpdateConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub stats: StatsConfig,
}

/// User-facing decision settings. Snapshotted once per decision batch.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub credential: String,
    #[serde(default, deserialize_with = "deserialize_countries")]
    pub blocked_countries: FxHashSet<String>,
    #[serde(default)]
    pub block_if_no_country: bool,
    #[serde(default)]
    pub use_relay: bool,
    #[serde(default)]
    pub relay_url: String,
    #[serde(default)]
    pub playlist_policy: PlaylistPolicy,
    #[serde(default = "default_sample_size")]
    pub sample_size: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistPolicy {
    Owner,
    AnyItem,
    Majority,
    #[default]
    OwnerOrMajority,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub capacity: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_upstream_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpdateConfig {
    #[serde(default = "default_settings_reload")]
    pub settings_reload_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_stats_enable")]
    pub enable: bool,
    #[serde(default = "default_log_interval")]
    pub log_interval_seconds: u64,
}

// Defaults
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8686
}
fn default_sample_size() -> u32 {
    20
}
fn default_cache_ttl() -> u64 {
    300
}
fn default_cache_capacity() -> u64 {
    10000
}
fn default_api_base() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}
fn default_upstream_timeout_ms() -> u64 {
    5000
}
fn default_concurrent_requests() -> usize {
    4
}
fn default_user_agent() -> String {
    "GeoNope/1.0".to_string()
}
fn default_settings_reload() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_stats_enable() -> bool {
    true
}
fn default_log_interval() -> u64 {
    300
}

/// Accepts either `["US", "cn"]` or `"US, cn"`.
fn deserialize_countries<'de, D>(deserializer: D) -> Result<FxHashSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum CountryList {
        Csv(String),
        List(Vec<String>),
    }

    let raw = match CountryList::deserialize(deserializer)? {
        CountryList::Csv(s) => s.split(',').map(str::to_string).collect(),
        CountryList::List(v) => v,
    };
    Ok(normalize_countries(raw))
}

pub fn normalize_countries<I, S>(raw: I) -> FxHashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|c| normalize_country(c.as_ref()))
        .collect()
}

/// Trimmed, upper-cased; blank means "no country".
pub fn normalize_country(raw: &str) -> Option<String> {
    let code = raw.trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_uppercase())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            settings: Settings::default(),
            cache: CacheConfig::default(),
            upstream: UpstreamConfig::default(),
            updates: UpdateConfig::default(),
            logging: LoggingConfig::default(),
            stats: StatsConfig::default(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            credential: String::new(),
            blocked_countries: FxHashSet::default(),
            block_if_no_country: false,
            use_relay: false,
            relay_url: String::new(),
            playlist_policy: PlaylistPolicy::default(),
            sample_size: default_sample_size(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            capacity: default_cache_capacity(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            timeout_ms: default_upstream_timeout_ms(),
            concurrent_requests: default_concurrent_requests(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            settings_reload_secs: default_settings_reload(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enable: default_stats_enable(),
            log_interval_seconds: default_log_interval(),
        }
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse config TOML")?;
        Ok(config)
    }
}

impl Settings {
    pub fn has_credential(&self) -> bool {
        !self.credential.trim().is_empty()
    }

    pub fn relay_enabled(&self) -> bool {
        self.use_relay && !self.relay_url.trim().is_empty()
    }

    /// Nothing can be looked up and nothing would be blocked without a lookup.
    pub fn is_lookup_disabled(&self) -> bool {
        !self.has_credential() && !self.block_if_no_country && !self.relay_enabled()
    }

    /// Clamped to `1..=50`.
    pub fn sample_size(&self) -> usize {
        self.sample_size.clamp(1, MAX_BATCH as u32) as usize
    }

    pub fn is_country_blocked(&self, country: &str) -> bool {
        self.blocked_countries.contains(country)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.port, 8686);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(
            config.settings.playlist_policy,
            PlaylistPolicy::OwnerOrMajority
        );
        assert_eq!(config.settings.sample_size(), 20);
        assert!(config.settings.is_lookup_disabled());
    }

    #[test]
    fn test_blocked_countries_from_csv_and_list() {
        let csv = Config::parse(
            r#"
            [settings]
            blocked_countries = " us, cn ,,"
            "#,
        )
        .unwrap();
        assert_eq!(csv.settings.blocked_countries.len(), 2);
        assert!(csv.settings.is_country_blocked("US"));
        assert!(csv.settings.is_country_blocked("CN"));

        let list = Config::parse(
            r#"
            [settings]
            blocked_countries = ["ru", " "]
            playlist_policy = "any_item"
            sample_size = 500
            "#,
        )
        .unwrap();
        assert_eq!(list.settings.blocked_countries.len(), 1);
        assert!(list.settings.is_country_blocked("RU"));
        assert_eq!(list.settings.playlist_policy, PlaylistPolicy::AnyItem);
        assert_eq!(list.settings.sample_size(), MAX_BATCH);
    }

    #[test]
    fn test_relay_requires_url() {
        let mut settings = Settings {
            use_relay: true,
            ..Settings::default()
        };
        assert!(!settings.relay_enabled());
        settings.relay_url = "http://relay.local".to_string();
        assert!(settings.relay_enabled());
        assert!(!settings.is_lookup_disabled());
    }

    #[test]
    fn test_sample_size_lower_clamp() {
        let settings = Settings {
            sample_size: 0,
            ..Settings::default()
        };
        assert_eq!(settings.sample_size(), 1);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let res = Config::parse(
            r#"
            [settings]
            playlist_policy = "everything"
            "#,
        );
        assert!(res.is_err());
    }
}
