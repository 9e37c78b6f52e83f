//! Cache backend implementations.

use super::key::CacheKey;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct StoredEntry {
    payload: Vec<u8>,
    stored_at: Instant,
    ttl: Duration,
}

impl StoredEntry {
    fn new(payload: Vec<u8>, ttl: Duration) -> Self {
        Self {
            payload,
            stored_at: Instant::now(),
            ttl,
        }
    }

    // Expiry is lazy: checked on read, enforced on write via eviction.
    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() > self.ttl
    }
}

/// Shared store behind the cache coordinator.
///
/// Backends fail with category `resource`; callers decide whether that is
/// fatal (the orchestrator treats it as a miss).
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &CacheKey, payload: &[u8], ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &CacheKey) -> Result<bool>;
    /// Remove every entry; returns how many were dropped.
    async fn clear(&self) -> Result<usize>;
    /// Count of live (unexpired) entries.
    async fn len(&self) -> Result<usize>;
    fn name(&self) -> &'static str;
}

/// In-process backend with lazy expiry and oldest-first eviction.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, StoredEntry>>,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    fn evict_if_needed(&self, entries: &mut HashMap<String, StoredEntry>) {
        entries.retain(|_, e| !e.is_expired());
        while entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    entries.remove(&k);
                }
                None => break,
            }
        }
    }

    fn poisoned() -> Error {
        Error::store(
            "cache lock poisoned",
            ErrorContext::new().with_source("cache_backend"),
        )
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        if let Some(entry) = entries.get(key.as_str()) {
            if entry.is_expired() {
                entries.remove(key.as_str());
                return Ok(None);
            }
            return Ok(Some(entry.payload.clone()));
        }
        Ok(None)
    }

    async fn set(&self, key: &CacheKey, payload: &[u8], ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        self.evict_if_needed(&mut entries);
        entries.insert(
            key.as_str().to_string(),
            StoredEntry::new(payload.to_vec(), ttl),
        );
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        Ok(entries.remove(key.as_str()).is_some())
    }

    async fn clear(&self) -> Result<usize> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        let dropped = entries.len();
        entries.clear();
        Ok(dropped)
    }

    async fn len(&self) -> Result<usize> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(entries.values().filter(|e| !e.is_expired()).count())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// No-op backend: every lookup misses, every write succeeds and is dropped.
pub struct NullCache;

impl NullCache {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for NullCache {
    async fn get(&self, _: &CacheKey) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
    async fn set(&self, _: &CacheKey, _: &[u8], _: Duration) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _: &CacheKey) -> Result<bool> {
        Ok(false)
    }
    async fn clear(&self) -> Result<usize> {
        Ok(0)
    }
    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
    fn name(&self) -> &'static str {
        "null"
    }
}
