use crate::config::{normalize_country, Settings};
use serde::Deserialize;
use thiserror::Error;

/// Resource kinds that can be looked up by comma-joined id lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Video,
    Channel,
    Playlist,
}

impl ResourceKind {
    pub fn endpoint(self) -> Endpoint {
        match self {
            ResourceKind::Video => Endpoint::Videos,
            ResourceKind::Channel => Endpoint::Channels,
            ResourceKind::Playlist => Endpoint::Playlists,
        }
    }
}

/// Upstream routes. Relay routes use the same paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Videos,
    Channels,
    Playlists,
    PlaylistItems,
}

impl Endpoint {
    pub const COUNT: usize = 4;
    pub const ALL: [Endpoint; Endpoint::COUNT] = [
        Endpoint::Videos,
        Endpoint::Channels,
        Endpoint::Playlists,
        Endpoint::PlaylistItems,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Videos => "videos",
            Endpoint::Channels => "channels",
            Endpoint::Playlists => "playlists",
            Endpoint::PlaylistItems => "playlistItems",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no credential configured for direct upstream access")]
    MissingCredential,
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: Endpoint },
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: Endpoint,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} lookup is not available through the relay")]
    RelayUnsupported { endpoint: Endpoint },
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: Endpoint, status: u16 },
    #[error("failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: Endpoint,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    pub(crate) fn from_send(endpoint: Endpoint, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            FetchError::Timeout { endpoint }
        } else {
            FetchError::Transport { endpoint, source }
        }
    }
}

/// How upstream is reached for one decision batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpstreamAccess {
    pub credential: String,
    /// Relay base URL; when set the caller's credential is never sent.
    pub relay: Option<String>,
}

impl UpstreamAccess {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            credential: settings.credential.trim().to_string(),
            relay: settings
                .relay_enabled()
                .then(|| settings.relay_url.trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceList<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawResource {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub snippet: Option<Snippet>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl RawResource {
    pub fn channel_id(&self) -> Option<&str> {
        self.snippet
            .as_ref()
            .and_then(|s| s.channel_id.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn country(&self) -> Option<String> {
        self.snippet
            .as_ref()
            .and_then(|s| s.country.as_deref())
            .and_then(normalize_country)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    #[serde(default)]
    pub content_details: Option<ItemContentDetails>,
    #[serde(default)]
    pub snippet: Option<ItemSnippet>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemContentDetails {
    #[serde(default)]
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSnippet {
    #[serde(default)]
    pub resource_id: Option<ItemResourceId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResourceId {
    #[serde(default)]
    pub video_id: Option<String>,
}

impl PlaylistItem {
    pub fn video_id(&self) -> Option<&str> {
        let from_details = self
            .content_details
            .as_ref()
            .and_then(|d| d.video_id.as_deref());
        let from_snippet = || {
            self.snippet
                .as_ref()
                .and_then(|s| s.resource_id.as_ref())
                .and_then(|r| r.video_id.as_deref())
        };
        from_details
            .or_else(from_snippet)
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Abstract upstream lookups for mocking and switching implementations.
#[async_trait::async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// One record per id found upstream; missing ids simply produce no record.
    async fn fetch(
        &self,
        kind: ResourceKind,
        ids: &[String],
        access: &UpstreamAccess,
    ) -> Result<Vec<RawResource>, FetchError>;

    /// Member video ids in playlist order, at most `max_count`.
    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        max_count: usize,
        access: &UpstreamAccess,
    ) -> Result<Vec<String>, FetchError>;

    /// The channel owning `handle` (without the leading `@`), if any.
    async fn resolve_handle(
        &self,
        handle: &str,
        access: &UpstreamAccess,
    ) -> Result<Option<RawResource>, FetchError>;
}
