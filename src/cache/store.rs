//! TTL-bounded LRU storage for rendered responses.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;
use metrics::counter;

use super::config::CacheConfig;
use super::keys::ResponseKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// Cached HTTP response.
#[derive(Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

struct Entry {
    response: CachedResponse,
    stored_at: Instant,
}

/// Response cache storage with per-entry TTL and LRU capacity eviction.
pub struct ResponseStore {
    entries: RwLock<LruCache<ResponseKey, Entry>>,
    ttl: Duration,
}

impl ResponseStore {
    /// Create a new store with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.response_limit_non_zero())),
            ttl: config.ttl(),
        }
    }

    /// Fetch a cached response, dropping it when the TTL has elapsed.
    pub fn get(&self, key: &ResponseKey) -> Option<CachedResponse> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &ResponseKey, now: Instant) -> Option<CachedResponse> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let entry = entries.get(key)?;

        if now.duration_since(entry.stored_at) >= self.ttl {
            entries.pop(key);
            counter!("yatube_cache_expired_total").increment(1);
            return None;
        }

        Some(entry.response.clone())
    }

    /// Store a response; racing writers simply overwrite each other, which is
    /// within the at-most-stale-by-TTL contract.
    pub fn set(&self, key: ResponseKey, response: CachedResponse) {
        self.set_at(key, response, Instant::now());
    }

    fn set_at(&self, key: ResponseKey, response: CachedResponse, now: Instant) {
        let evicted = rw_write(&self.entries, SOURCE, "set").push(
            key,
            Entry {
                response,
                stored_at: now,
            },
        );
        if evicted.is_some() {
            counter!("yatube_cache_evict_total").increment(1);
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
    }
}
