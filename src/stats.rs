use crate::fetcher::Endpoint;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{self, Duration};
use tracing::info;

#[derive(Debug, Default)]
pub struct StatsCollector {
    // Basic Counters
    decisions: AtomicU64,
    blocked: AtomicU64,
    fail_open: AtomicU64,

    // Cache hits by cache (channel, playlist, handle)
    channel_cache_hits: AtomicU64,
    playlist_cache_hits: AtomicU64,
    handle_cache_hits: AtomicU64,

    // Upstream, indexed by Endpoint
    upstream_total_ms: [AtomicU64; Endpoint::COUNT],
    upstream_count: [AtomicU64; Endpoint::COUNT],
    upstream_failures: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub decisions: u64,
    pub blocked: u64,
    pub fail_open: u64,
    pub channel_cache_hits: u64,
    pub playlist_cache_hits: u64,
    pub handle_cache_hits: u64,
    pub upstream_requests: u64,
    pub upstream_failures: u64,
    pub upstream_avg_ms: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Copy)]
pub enum CacheKind {
    Channel,
    Playlist,
    Handle,
}

impl StatsCollector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Spawns the periodic stats dump. Requires a running tokio runtime.
    pub fn spawn_logger(self: &Arc<Self>, log_interval_sec: u64) {
        let stats = self.clone();
        let interval = Duration::from_secs(log_interval_sec.max(1));
        tokio::spawn(async move {
            stats.run_logger(interval).await;
        });
    }

    pub fn inc_decisions(&self, n: u64) {
        self.decisions.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_blocked(&self) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fail_open(&self, n: u64) {
        self.fail_open.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_cache_hits(&self, cache: CacheKind, n: u64) {
        let counter = match cache {
            CacheKind::Channel => &self.channel_cache_hits,
            CacheKind::Playlist => &self.playlist_cache_hits,
            CacheKind::Handle => &self.handle_cache_hits,
        };
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_upstream_latency(&self, endpoint: Endpoint, ms: u64) {
        let idx = endpoint.index();
        self.upstream_total_ms[idx].fetch_add(ms, Ordering::Relaxed);
        self.upstream_count[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> StatsSnapshot {
        let mut upstream_requests = 0;
        let mut upstream_avg_ms = Vec::new();
        for endpoint in Endpoint::ALL {
            let idx = endpoint.index();
            let count = self.upstream_count[idx].load(Ordering::Relaxed);
            upstream_requests += count;
            if count > 0 {
                let total_ms = self.upstream_total_ms[idx].load(Ordering::Relaxed);
                upstream_avg_ms.push((
                    endpoint.path().to_string(),
                    total_ms as f64 / count as f64,
                ));
            }
        }

        StatsSnapshot {
            decisions: self.decisions.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            fail_open: self.fail_open.load(Ordering::Relaxed),
            channel_cache_hits: self.channel_cache_hits.load(Ordering::Relaxed),
            playlist_cache_hits: self.playlist_cache_hits.load(Ordering::Relaxed),
            handle_cache_hits: self.handle_cache_hits.load(Ordering::Relaxed),
            upstream_requests,
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            upstream_avg_ms,
        }
    }

    async fn run_logger(&self, log_interval: Duration) {
        let mut interval = time::interval(log_interval);
        loop {
            interval.tick().await;
            self.dump_stats();
        }
    }

    fn dump_stats(&self) {
        let snap = self.get_snapshot();

        let mut upstream_stats = String::new();
        for (name, avg) in &snap.upstream_avg_ms {
            upstream_stats.push_str(&format!("[{}: {:.1}ms] ", name, avg));
        }

        info!(
            "STATS DUMP: Decisions: {}, Blocked: {} ({:.1}%), FailOpen: {}, CacheHits: channel={} playlist={} handle={}, Upstream: {} requests, {} failures {}",
            snap.decisions,
            snap.blocked,
            if snap.decisions > 0 {
                (snap.blocked as f64 / snap.decisions as f64) * 100.0
            } else {
                0.0
            },
            snap.fail_open,
            snap.channel_cache_hits,
            snap.playlist_cache_hits,
            snap.handle_cache_hits,
            snap.upstream_requests,
            snap.upstream_failures,
            upstream_stats
        );
    }
}
