use super::types::{
    Endpoint, FetchError, PlaylistItem, RawResource, ResourceFetcher, ResourceKind, ResourceList,
    UpstreamAccess,
};
use crate::config::{UpstreamConfig, MAX_BATCH};
use crate::stats::StatsCollector;
use anyhow::{Context, Result};
use futures::{stream, StreamExt, TryStreamExt};
use reqwest::Client;
use rustc_hash::FxHashSet;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Where one request goes: the upstream API with the caller's key, or a relay
/// holding its own.
enum Target<'a> {
    Direct { base: &'a str, key: &'a str },
    Relay { base: &'a str },
}

impl<'a> Target<'a> {
    fn select(api_base: &'a str, access: &'a UpstreamAccess) -> Result<Self, FetchError> {
        if let Some(relay) = access.relay.as_deref() {
            return Ok(Target::Relay { base: relay });
        }
        if access.credential.is_empty() {
            return Err(FetchError::MissingCredential);
        }
        Ok(Target::Direct {
            base: api_base,
            key: &access.credential,
        })
    }

    fn url(&self, endpoint: Endpoint) -> String {
        let base = match self {
            Target::Direct { base, .. } | Target::Relay { base } => base,
        };
        format!("{}/{}", base.trim_end_matches('/'), endpoint.path())
    }

    /// Adds `part` and `key` for direct access; relays only get `params`.
    fn query(&self, part: &str, params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        match self {
            Target::Direct { key, .. } => {
                let mut query = vec![("part", part.to_string())];
                query.extend(params);
                query.push(("key", key.to_string()));
                query
            }
            Target::Relay { .. } => params,
        }
    }

    fn ids_param(&self) -> &'static str {
        match self {
            Target::Direct { .. } => "id",
            Target::Relay { .. } => "ids",
        }
    }
}

pub struct HttpFetcher {
    client: Client,
    api_base: String,
    concurrency: usize,
    stats: Arc<StatsCollector>,
}

impl HttpFetcher {
    pub fn new(config: &UpstreamConfig, stats: Arc<StatsCollector>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            concurrency: config.concurrent_requests.max(1),
            stats,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        target: &Target<'_>,
        query: &[(&'static str, String)],
    ) -> Result<T, FetchError> {
        let url = target.url(endpoint);
        debug!("GET {}", url);

        let start = Instant::now();
        let res = self.client.get(&url).query(query).send().await;
        self.stats
            .record_upstream_latency(endpoint, start.elapsed().as_millis() as u64);

        let result = match res {
            Ok(resp) if resp.status().is_success() => resp
                .json::<T>()
                .await
                .map_err(|source| FetchError::Decode { endpoint, source }),
            Ok(resp) => Err(FetchError::Status {
                endpoint,
                status: resp.status().as_u16(),
            }),
            Err(e) => Err(FetchError::from_send(endpoint, e)),
        };

        if let Err(e) = &result {
            self.stats.inc_upstream_failure();
            warn!("Upstream {} failed: {}", url, e);
        }
        result
    }

    async fn fetch_chunk(
        &self,
        kind: ResourceKind,
        chunk: Vec<String>,
        target: &Target<'_>,
    ) -> Result<Vec<RawResource>, FetchError> {
        let query = target.query("snippet", vec![(target.ids_param(), chunk.join(","))]);
        let list: ResourceList<RawResource> =
            self.get_json(kind.endpoint(), target, &query).await?;
        Ok(list.items.into_iter().filter(|r| !r.id.is_empty()).collect())
    }
}

#[async_trait::async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(
        &self,
        kind: ResourceKind,
        ids: &[String],
        access: &UpstreamAccess,
    ) -> Result<Vec<RawResource>, FetchError> {
        let mut seen = FxHashSet::default();
        let unique: Vec<String> = ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();
        if unique.is_empty() {
            return Ok(vec![]);
        }

        let target = Target::select(&self.api_base, access)?;
        let target = &target;

        let chunks: Vec<Vec<String>> = unique.chunks(MAX_BATCH).map(<[String]>::to_vec).collect();

        let results: Vec<Vec<RawResource>> = stream::iter(chunks)
            .map(|chunk| self.fetch_chunk(kind, chunk, target))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        Ok(results.into_iter().flatten().collect())
    }

    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        max_count: usize,
        access: &UpstreamAccess,
    ) -> Result<Vec<String>, FetchError> {
        let target = Target::select(&self.api_base, access)?;
        let mut video_ids = Vec::new();
        let mut page_token: Option<String> = None;
        // Pages without usable video ids never grow `video_ids`.
        let max_pages = max_count.div_ceil(MAX_BATCH) + 1;

        for _ in 0..max_pages {
            if video_ids.len() >= max_count {
                break;
            }
            let page_size = (max_count - video_ids.len()).min(MAX_BATCH);
            let mut params = vec![
                ("playlistId", playlist_id.to_string()),
                ("maxResults", page_size.to_string()),
            ];
            if let Some(token) = page_token.take() {
                params.push(("pageToken", token));
            }
            let query = target.query("contentDetails", params);

            let page: ResourceList<PlaylistItem> = self
                .get_json(Endpoint::PlaylistItems, &target, &query)
                .await?;
            video_ids.extend(
                page.items
                    .iter()
                    .filter_map(|item| item.video_id())
                    .map(str::to_string),
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() && !page.items.is_empty() => {
                    page_token = Some(token)
                }
                _ => break,
            }
        }

        video_ids.truncate(max_count);
        Ok(video_ids)
    }

    async fn resolve_handle(
        &self,
        handle: &str,
        access: &UpstreamAccess,
    ) -> Result<Option<RawResource>, FetchError> {
        let target = Target::select(&self.api_base, access)?;
        // Relays only answer id lookups.
        if let Target::Relay { .. } = target {
            warn!("Handle @{} cannot be resolved through the relay", handle);
            return Err(FetchError::RelayUnsupported {
                endpoint: Endpoint::Channels,
            });
        }
        let query = target.query("snippet", vec![("forHandle", format!("@{}", handle))]);
        let list: ResourceList<RawResource> = self
            .get_json(Endpoint::Channels, &target, &query)
            .await?;
        Ok(list.items.into_iter().find(|r| !r.id.is_empty()))
    }
}
