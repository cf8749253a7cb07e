//! Identity resolution: video / playlist / handle / channel id down to channel country.
//!
//! Only upstream facts are cached (channel country, playlist owner, handle owner).
//! Verdicts are recomputed from the caller's settings on every call.

use crate::cache::TtlCache;
use crate::config::{CacheConfig, Settings};
use crate::engine::{ItemKind, Reason, Verdict};
use crate::fetcher::{FetchError, RawResource, ResourceFetcher, ResourceKind, UpstreamAccess};
use crate::stats::{CacheKind, StatsCollector};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{0:?} identifiers are not decided by the identity resolver")]
    Unsupported(ItemKind),
}

impl ResolveError {
    /// The fail-open verdict for this failure.
    pub fn verdict(&self) -> Verdict {
        match self {
            ResolveError::Fetch(_) => Verdict::allowed(Reason::FetchFailed),
            ResolveError::Unsupported(_) => Verdict::allowed(Reason::Error),
        }
    }
}

/// Resolves identifiers to `channel -> Option<country>` facts.
///
/// Constructed once per process; the caches live as long as the resolver.
pub struct IdentityResolver {
    fetcher: Arc<dyn ResourceFetcher>,
    channel_countries: TtlCache<String, Option<String>>,
    playlist_owners: TtlCache<String, Option<String>>,
    handle_channels: TtlCache<String, String>,
    stats: Arc<StatsCollector>,
}

fn dedup(ids: &[String]) -> Vec<String> {
    let mut seen = FxHashSet::default();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Cache key for a handle: no leading `@`, lower-cased.
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}

impl IdentityResolver {
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        config: &CacheConfig,
        stats: Arc<StatsCollector>,
    ) -> Self {
        let ttl = Duration::from_secs(config.ttl_secs);
        Self {
            fetcher,
            channel_countries: TtlCache::new(ttl, config.capacity),
            playlist_owners: TtlCache::new(ttl, config.capacity),
            handle_channels: TtlCache::new(ttl, config.capacity),
            stats,
        }
    }

    /// Drops every cached fact.
    pub fn clear_caches(&self) {
        self.channel_countries.clear();
        self.playlist_owners.clear();
        self.handle_channels.clear();
    }

    /// Cache-then-batch-fetch. Found records are cached with `extract(record)`;
    /// ids upstream did not return map to `None` and are left uncached.
    async fn cached_lookup(
        &self,
        cache: &TtlCache<String, Option<String>>,
        cache_kind: CacheKind,
        kind: ResourceKind,
        ids: &[String],
        access: &UpstreamAccess,
        extract: fn(&RawResource) -> Option<String>,
    ) -> Result<FxHashMap<String, Option<String>>, FetchError> {
        let mut result = FxHashMap::default();
        let mut to_fetch = Vec::new();

        for id in dedup(ids) {
            match cache.get(&id).await {
                Some(value) => {
                    result.insert(id, value);
                }
                None => to_fetch.push(id),
            }
        }
        self.stats
            .inc_cache_hits(cache_kind, result.len() as u64);

        if to_fetch.is_empty() {
            return Ok(result);
        }

        debug!(
            "{:?} lookup: {} cached, {} to fetch",
            kind,
            result.len(),
            to_fetch.len()
        );
        let requested: FxHashSet<&str> = to_fetch.iter().map(String::as_str).collect();
        let records = self.fetcher.fetch(kind, &to_fetch, access).await?;
        for record in records {
            if !requested.contains(record.id.as_str()) {
                continue;
            }
            let value = extract(&record);
            cache.set(record.id.clone(), value.clone()).await;
            result.insert(record.id, value);
        }

        for id in to_fetch {
            result.entry(id).or_insert(None);
        }
        Ok(result)
    }

    pub async fn resolve_channel_country(
        &self,
        channel_ids: &[String],
        access: &UpstreamAccess,
    ) -> Result<FxHashMap<String, Option<String>>, FetchError> {
        self.cached_lookup(
            &self.channel_countries,
            CacheKind::Channel,
            ResourceKind::Channel,
            channel_ids,
            access,
            RawResource::country,
        )
        .await
    }

    pub async fn resolve_playlist_owner(
        &self,
        playlist_ids: &[String],
        access: &UpstreamAccess,
    ) -> Result<FxHashMap<String, Option<String>>, FetchError> {
        self.cached_lookup(
            &self.playlist_owners,
            CacheKind::Playlist,
            ResourceKind::Playlist,
            playlist_ids,
            access,
            |r| r.channel_id().map(str::to_string),
        )
        .await
    }

    /// Not cached: looked up fresh for every decision.
    pub async fn resolve_video_channel(
        &self,
        video_ids: &[String],
        access: &UpstreamAccess,
    ) -> Result<FxHashMap<String, Option<String>>, FetchError> {
        let video_ids = dedup(video_ids);
        if video_ids.is_empty() {
            return Ok(FxHashMap::default());
        }

        let records = self
            .fetcher
            .fetch(ResourceKind::Video, &video_ids, access)
            .await?;
        let mut found: FxHashMap<String, String> = records
            .iter()
            .filter_map(|r| r.channel_id().map(|ch| (r.id.clone(), ch.to_string())))
            .collect();

        Ok(video_ids
            .into_iter()
            .map(|id| {
                let channel = found.remove(&id);
                (id, channel)
            })
            .collect())
    }

    /// Keys of the result are the handles as given. A found handle also seeds
    /// the channel-country cache from the same response.
    pub async fn resolve_handle_channel(
        &self,
        handles: &[String],
        access: &UpstreamAccess,
    ) -> Result<FxHashMap<String, Option<String>>, FetchError> {
        let mut result = FxHashMap::default();
        let mut hits = 0;

        for handle in dedup(handles) {
            let key = normalize_handle(&handle);
            if key.is_empty() {
                result.insert(handle, None);
                continue;
            }
            if let Some(channel_id) = self.handle_channels.get(&key).await {
                hits += 1;
                result.insert(handle, Some(channel_id));
                continue;
            }

            let bare = handle.trim().trim_start_matches('@');
            let channel = self.fetcher.resolve_handle(bare, access).await?;
            let channel_id = match channel {
                Some(record) => {
                    self.channel_countries
                        .set(record.id.clone(), record.country())
                        .await;
                    self.handle_channels.set(key, record.id.clone()).await;
                    Some(record.id)
                }
                None => None,
            };
            result.insert(handle, channel_id);
        }

        self.stats.inc_cache_hits(CacheKind::Handle, hits);
        Ok(result)
    }

    pub async fn list_playlist_members(
        &self,
        playlist_id: &str,
        max_count: usize,
        access: &UpstreamAccess,
    ) -> Result<Vec<String>, FetchError> {
        self.fetcher
            .list_playlist_items(playlist_id, max_count, access)
            .await
    }

    pub async fn decide(
        &self,
        kind: ItemKind,
        id: &str,
        settings: &Settings,
    ) -> Result<Verdict, ResolveError> {
        let mut verdicts = self.decide_many(kind, &[id.to_string()], settings).await?;
        Ok(verdicts
            .remove(id)
            .unwrap_or_else(|| Verdict::allowed(Reason::NotFound)))
    }

    /// Batched `decide` for videos, channels and handles.
    pub async fn decide_many(
        &self,
        kind: ItemKind,
        ids: &[String],
        settings: &Settings,
    ) -> Result<FxHashMap<String, Verdict>, ResolveError> {
        if settings.is_lookup_disabled() {
            return Ok(ids
                .iter()
                .map(|id| (id.clone(), Verdict::allowed(Reason::NoCredential)))
                .collect());
        }
        if ids.is_empty() {
            return Ok(FxHashMap::default());
        }

        let access = UpstreamAccess::from_settings(settings);
        let channel_of: FxHashMap<String, Option<String>> = match kind {
            ItemKind::Channel => ids
                .iter()
                .map(|id| (id.clone(), Some(id.trim().to_string())))
                .collect(),
            ItemKind::Video => self.resolve_video_channel(ids, &access).await?,
            ItemKind::Handle => self.resolve_handle_channel(ids, &access).await?,
            ItemKind::Playlist => return Err(ResolveError::Unsupported(kind)),
        };

        let channel_ids: Vec<String> = channel_of.values().flatten().cloned().collect();
        let countries = self.resolve_channel_country(&channel_ids, &access).await?;

        Ok(ids
            .iter()
            .map(|id| {
                let verdict = match channel_of.get(id).cloned().flatten() {
                    None => Verdict::allowed(Reason::NotFound),
                    Some(channel_id) => {
                        let country = countries.get(&channel_id).cloned().flatten();
                        Verdict::for_channel_country(country.as_deref(), settings)
                    }
                };
                (id.clone(), verdict)
            })
            .collect())
    }
}
