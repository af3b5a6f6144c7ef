//! Request-keyed response cache with a freshness window.
//!
//! Entries are keyed by the full request signature (method, URI and every
//! header, credential included) so a response is never replayed to a
//! different auth context. Writes are last-write-wins.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, Uri};
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache is full ({capacity} entries)")]
    Full { capacity: usize },

    #[error("Refusing to cache an entry with zero TTL")]
    ZeroTtl,
}

/// Canonical request signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: String,
    uri: String,
    headers: Vec<(String, Vec<u8>)>,
}

impl CacheKey {
    pub fn from_request(method: &Method, uri: &Uri, headers: &HeaderMap) -> Self {
        let mut pairs: Vec<(String, Vec<u8>)> = headers
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
            .collect();
        pairs.sort();
        Self {
            method: method.as_str().to_string(),
            uri: uri.to_string(),
            headers: pairs,
        }
    }
}

/// A stored response body with the headers needed to replay it.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub content_type: String,
    pub cache_control: String,
    pub body: Bytes,
}

/// External store of replayable responses.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Fresh entry for `key`, if any.
    async fn lookup(&self, key: &CacheKey) -> Option<CachedResponse>;

    /// Store `response` under `key` for `ttl`.
    async fn store(
        &self,
        key: CacheKey,
        response: CachedResponse,
        ttl: Duration,
    ) -> Result<(), CacheError>;
}

struct Entry {
    response: CachedResponse,
    expires_at: Instant,
}

/// In-process [`ResponseCache`].
pub struct MemoryResponseCache {
    entries: RwLock<HashMap<CacheKey, Entry>>,
    capacity: usize,
}

impl MemoryResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Number of stored entries, fresh or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryResponseCache {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl ResponseCache for MemoryResponseCache {
    async fn lookup(&self, key: &CacheKey) -> Option<CachedResponse> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.response.clone())
    }

    async fn store(
        &self,
        key: CacheKey,
        response: CachedResponse,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::ZeroTtl);
        }

        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        if entries.len() < before {
            debug!(purged = before - entries.len(), "Purged expired cache entries");
        }

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            return Err(CacheError::Full {
                capacity: self.capacity,
            });
        }

        entries.insert(
            key,
            Entry {
                response,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }
}
