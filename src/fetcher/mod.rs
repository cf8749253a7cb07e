pub mod http;
pub mod types;

use crate::config::Config;
use crate::stats::StatsCollector;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub use self::http::HttpFetcher;
pub use self::types::{
    Endpoint, FetchError, PlaylistItem, RawResource, ResourceFetcher, ResourceKind, ResourceList,
    Snippet, UpstreamAccess,
};

pub fn create_fetcher(
    config: &Config,
    stats: Arc<StatsCollector>,
) -> Result<Arc<dyn ResourceFetcher>> {
    let fetcher = HttpFetcher::new(&config.upstream, stats)?;
    info!(
        "Upstream: {} (timeout {}ms, {} concurrent requests)",
        config.upstream.api_base, config.upstream.timeout_ms, config.upstream.concurrent_requests
    );
    Ok(Arc::new(fetcher) as Arc<dyn ResourceFetcher>)
}
