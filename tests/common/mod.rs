#![allow(dead_code)]

use geo_nope::config::{normalize_countries, CacheConfig, PlaylistPolicy, Settings};
use geo_nope::engine::DecisionService;
use geo_nope::fetcher::{
    Endpoint, FetchError, RawResource, ResourceFetcher, ResourceKind, Snippet, UpstreamAccess,
};
use geo_nope::resolver::IdentityResolver;
use geo_nope::settings::SettingsStore;
use geo_nope::stats::StatsCollector;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory upstream: channels with optional country, videos and playlists
/// pointing at channels, playlist members.
#[derive(Default)]
pub struct MockFetcher {
    pub channels: HashMap<String, Option<String>>,
    pub videos: HashMap<String, String>,
    pub playlists: HashMap<String, String>,
    pub members: HashMap<String, Vec<String>>,
    pub fail: AtomicBool,
    pub fetch_calls: AtomicUsize,
    pub item_calls: AtomicUsize,
    /// `max_count` of every playlist listing, in call order.
    pub item_limits: Mutex<Vec<usize>>,
}

impl MockFetcher {
    pub fn channel(mut self, id: &str, country: Option<&str>) -> Self {
        self.channels
            .insert(id.to_string(), country.map(str::to_string));
        self
    }

    pub fn video(mut self, id: &str, channel: &str) -> Self {
        self.videos.insert(id.to_string(), channel.to_string());
        self
    }

    pub fn playlist(mut self, id: &str, owner: &str, members: &[&str]) -> Self {
        self.playlists.insert(id.to_string(), owner.to_string());
        self.members.insert(
            id.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    pub fn failing(self) -> Self {
        self.fail.store(true, Ordering::SeqCst);
        self
    }

    pub fn total_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst) + self.item_calls.load(Ordering::SeqCst)
    }

    fn check(&self, endpoint: Endpoint) -> Result<(), FetchError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(FetchError::Status {
                endpoint,
                status: 429,
            })
        } else {
            Ok(())
        }
    }

    fn record(id: &str, channel_id: Option<&String>, country: Option<&String>) -> RawResource {
        RawResource {
            id: id.to_string(),
            snippet: Some(Snippet {
                channel_id: channel_id.cloned(),
                country: country.cloned(),
            }),
        }
    }
}

#[async_trait::async_trait]
impl ResourceFetcher for MockFetcher {
    async fn fetch(
        &self,
        kind: ResourceKind,
        ids: &[String],
        _access: &UpstreamAccess,
    ) -> Result<Vec<RawResource>, FetchError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.check(kind.endpoint())?;

        Ok(ids
            .iter()
            .filter_map(|id| match kind {
                ResourceKind::Channel => self
                    .channels
                    .get(id)
                    .map(|country| Self::record(id, None, country.as_ref())),
                ResourceKind::Video => self
                    .videos
                    .get(id)
                    .map(|ch| Self::record(id, Some(ch), None)),
                ResourceKind::Playlist => self
                    .playlists
                    .get(id)
                    .map(|ch| Self::record(id, Some(ch), None)),
            })
            .collect())
    }

    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        max_count: usize,
        _access: &UpstreamAccess,
    ) -> Result<Vec<String>, FetchError> {
        self.item_calls.fetch_add(1, Ordering::SeqCst);
        self.item_limits.lock().unwrap().push(max_count);
        self.check(Endpoint::PlaylistItems)?;

        Ok(self
            .members
            .get(playlist_id)
            .map(|m| m.iter().take(max_count).cloned().collect())
            .unwrap_or_default())
    }

    async fn resolve_handle(
        &self,
        _handle: &str,
        _access: &UpstreamAccess,
    ) -> Result<Option<RawResource>, FetchError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.check(Endpoint::Channels)?;
        Ok(None)
    }
}

pub fn settings(blocked: &[&str], block_if_no_country: bool, policy: PlaylistPolicy) -> Settings {
    Settings {
        credential: "test-key".to_string(),
        blocked_countries: normalize_countries(blocked),
        block_if_no_country,
        playlist_policy: policy,
        ..Settings::default()
    }
}

pub fn service(fetcher: Arc<MockFetcher>, settings: Settings) -> DecisionService {
    let stats = StatsCollector::new();
    let resolver = Arc::new(IdentityResolver::new(
        fetcher,
        &CacheConfig::default(),
        stats.clone(),
    ));
    DecisionService::new(resolver, SettingsStore::new(settings, None), stats)
}

pub fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
