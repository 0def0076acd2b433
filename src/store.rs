//! Response store behind the cache protocol
//!
//! The proxy talks to the store through the `ResponseStore` trait so the
//! in-memory implementation can be swapped for a shared tier later. Store
//! failures are reported as errors but callers treat them as advisory: a
//! broken cache degrades to pass-through, it never fails a request.

use crate::error::{MirrorError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A complete cached response: status, headers, body
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Keyed response cache with per-entry TTL
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Look up a response by exact key; expired entries read as absent
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>>;

    /// Store a response under a key with a TTL; overwrites any prior entry
    async fn put(&self, key: &str, entry: CachedResponse, ttl: Duration) -> Result<()>;
}

struct StoredEntry {
    response: CachedResponse,
    expires_at: Instant,
    last_accessed: Instant,
}

#[derive(Default)]
struct StoreState {
    entries: HashMap<String, StoredEntry>,
    current_size: usize,
    hits: u64,
    misses: u64,
    puts: u64,
}

/// In-process response store
///
/// Entries expire by TTL and, when a byte cap is set, are evicted least
/// recently used. Expired entries are swept opportunistically on writes.
pub struct MemoryStore {
    state: RwLock<StoreState>,
    max_size_bytes: Option<usize>,
}

/// Point-in-time store statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub entry_count: usize,
    pub size_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            state: RwLock::new(StoreState::default()),
            max_size_bytes: None,
        }
    }

    pub fn with_max_size(max_size_bytes: usize) -> Self {
        MemoryStore {
            state: RwLock::new(StoreState::default()),
            max_size_bytes: Some(max_size_bytes),
        }
    }

    pub fn get_stats(&self) -> StoreStats {
        match self.state.read() {
            Ok(state) => StoreStats {
                entry_count: state.entries.len(),
                size_bytes: state.current_size,
                hits: state.hits,
                misses: state.misses,
                puts: state.puts,
            },
            Err(_) => StoreStats {
                entry_count: 0,
                size_bytes: 0,
                hits: 0,
                misses: 0,
                puts: 0,
            },
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>> {
        let mut state = self
            .state
            .write()
            .map_err(|_| MirrorError::CacheError("store lock poisoned".to_string()))?;

        let now = Instant::now();
        match state.entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.last_accessed = now;
                let response = entry.response.clone();
                state.hits += 1;
                Ok(Some(response))
            }
            Some(_) => {
                // Expired: remove eagerly so size accounting stays honest
                if let Some(stale) = state.entries.remove(key) {
                    state.current_size -= stale.response.body.len();
                }
                state.misses += 1;
                Ok(None)
            }
            None => {
                state.misses += 1;
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &str, entry: CachedResponse, ttl: Duration) -> Result<()> {
        let body_size = entry.body.len();

        // Entries larger than the whole cap can never be stored
        if let Some(max) = self.max_size_bytes {
            if body_size > max {
                debug!(key = %key, size = body_size, "entry exceeds store cap, skipping");
                return Ok(());
            }
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| MirrorError::CacheError("store lock poisoned".to_string()))?;

        let now = Instant::now();

        if let Some(previous) = state.entries.remove(key) {
            state.current_size -= previous.response.body.len();
        }

        sweep_expired(&mut state, now);

        if let Some(max) = self.max_size_bytes {
            while state.current_size + body_size > max {
                let oldest = state
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.last_accessed)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(victim) => {
                        if let Some(evicted) = state.entries.remove(&victim) {
                            state.current_size -= evicted.response.body.len();
                            warn!(key = %victim, "evicted cache entry to make room");
                        }
                    }
                    None => break,
                }
            }
        }

        state.current_size += body_size;
        state.puts += 1;
        state.entries.insert(
            key.to_string(),
            StoredEntry {
                response: entry,
                expires_at: now + ttl,
                last_accessed: now,
            },
        );

        Ok(())
    }
}

fn sweep_expired(state: &mut StoreState, now: Instant) {
    let expired: Vec<String> = state
        .entries
        .iter()
        .filter(|(_, e)| e.expires_at <= now)
        .map(|(k, _)| k.clone())
        .collect();

    for key in expired {
        if let Some(entry) = state.entries.remove(&key) {
            state.current_size -= entry.response.body.len();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(body: &str) -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: HeaderMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[tokio::test]
    async fn test_miss_on_empty_store() {
        let store = MemoryStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
        assert_eq!(store.get_stats().misses, 1);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryStore::new();
        store
            .put("key-a", entry("hello"), Duration::from_secs(60))
            .await
            .unwrap();

        let found = store.get("key-a").await.unwrap().unwrap();
        assert_eq!(found.status, 200);
        assert_eq!(found.body, Bytes::from("hello"));
        assert_eq!(store.get_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_exact_key_match_only() {
        let store = MemoryStore::new();
        store
            .put("key-a?__v=v1", entry("hello"), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(store.get("key-a?__v=v2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_absent() {
        let store = MemoryStore::new();
        store
            .put("key-a", entry("hello"), Duration::from_millis(10))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.get("key-a").await.unwrap().is_none());
        assert_eq!(store.get_stats().entry_count, 0);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_entry() {
        let store = MemoryStore::new();
        store
            .put("key-a", entry("first"), Duration::from_secs(60))
            .await
            .unwrap();
        store
            .put("key-a", entry("second"), Duration::from_secs(60))
            .await
            .unwrap();

        let found = store.get("key-a").await.unwrap().unwrap();
        assert_eq!(found.body, Bytes::from("second"));
        assert_eq!(store.get_stats().entry_count, 1);
        assert_eq!(store.get_stats().size_bytes, "second".len());
    }

    #[tokio::test]
    async fn test_lru_eviction_under_byte_cap() {
        let store = MemoryStore::with_max_size(10);
        store
            .put("old", entry("aaaaa"), Duration::from_secs(60))
            .await
            .unwrap();
        store
            .put("new", entry("bbbbb"), Duration::from_secs(60))
            .await
            .unwrap();

        // Touch "old" so "new" becomes least recently used
        store.get("old").await.unwrap();
        store
            .put("third", entry("ccccc"), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(store.get("old").await.unwrap().is_some());
        assert!(store.get("new").await.unwrap().is_none());
        assert!(store.get("third").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_oversized_entry_skipped() {
        let store = MemoryStore::with_max_size(3);
        store
            .put("big", entry("way too large"), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(store.get("big").await.unwrap().is_none());
        assert_eq!(store.get_stats().size_bytes, 0);
    }
}
