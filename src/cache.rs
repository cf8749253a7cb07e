//! Fixed-TTL cache used for upstream facts (channel country, playlist owner, handle).
//!
//! Expiry is lazy: an entry older than the TTL is treated as a miss. Reads never
//! remove entries; the next `set` replaces a stale entry and moka reclaims the
//! rest. Capacity is bounded by moka.

use moka::future::Cache;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

#[derive(Clone)]
pub struct TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<K, CacheEntry<V>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_expired(&self, entry: &CacheEntry<V>) -> bool {
        Instant::now().duration_since(entry.stored_at) > self.ttl
    }

    /// A stale entry is left in place so a concurrent `set` is never undone.
    pub async fn get(&self, key: &K) -> Option<V> {
        let entry = self.inner.get(key).await?;
        if self.is_expired(&entry) {
            return None;
        }
        Some(entry.value)
    }

    /// Always overwrites; concurrent writers of the same fact are last-writer-wins.
    pub async fn set(&self, key: K, value: V) {
        self.inner
            .insert(
                key,
                CacheEntry {
                    value,
                    stored_at: Instant::now(),
                },
            )
            .await;
    }

    pub async fn invalidate(&self, key: &K) {
        self.inner.invalidate(key).await;
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Approximate; moka applies pending writes lazily.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}
