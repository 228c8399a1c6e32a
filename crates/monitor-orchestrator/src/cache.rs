use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;

struct CacheEntry<V> {
    data: V,
    cached_at: DateTime<Utc>,
}

/// TTL cache with per-key single-flight.
///
/// Concurrent computations for the same key are collapsed onto one
/// in-flight computation via a per-key async lock with a double-checked
/// cache read. The key space is small and bounded (subject ids, horizons),
/// so per-key locks are kept rather than reaped.
pub struct TtlCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    inflight: DashMap<K, Arc<Mutex<()>>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            inflight: DashMap::new(),
            ttl,
        }
    }

    /// Fresh (within-TTL) cached value, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).and_then(|entry| {
            if Utc::now() - entry.cached_at <= self.ttl {
                Some(entry.data.clone())
            } else {
                None
            }
        })
    }

    /// Last cached value regardless of age.
    pub fn get_any(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.data.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(
            key,
            CacheEntry {
                data: value,
                cached_at: Utc::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    /// The single-flight lock for a key.
    pub fn key_lock(&self, key: &K) -> Arc<Mutex<()>> {
        self.inflight.entry(key.clone()).or_default().clone()
    }

    /// Serve from cache or compute once, with waiters sharing the result.
    pub async fn get_or_compute<F, Fut, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }

        let lock = self.key_lock(&key);
        let _guard = lock.lock().await;

        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }

        let value = compute().await?;
        self.insert(key, value.clone());
        Ok(value)
    }
}
