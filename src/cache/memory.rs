//! Process-local caches.
//!
//! [`MemoryCache`] is a generic TTL map used for small per-process state
//! such as the tenant access token. [`MemoryCatalogCache`] is the catalog
//! backend selected when no durable store is configured; it keeps the most
//! recent snapshot around past expiry so the read path can serve stale data
//! through a short upstream outage.

use crate::cache::{CatalogCache, UNKNOWN_SYNC};
use crate::models::{CachedCatalog, PromptRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Simple in-process TTL cache.
///
/// Expiry is checked lazily on read; there is no background eviction and no
/// size bound. Values round-trip through `serde_json::Value` so one cache
/// can hold heterogeneous types.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl MemoryCache {
    /// Creates a cache with a default time-to-live in seconds.
    #[must_use]
    pub fn new(default_ttl_secs: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl: Duration::from_secs(default_ttl_secs),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the value for `key` if present and unexpired.
    ///
    /// An expired entry is evicted on the way out.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if Instant::now() <= entry.expires_at => {
                serde_json::from_value(entry.value.clone()).ok()
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Stores a value, overwriting any existing entry.
    ///
    /// `ttl_secs` overrides the instance default for this entry only.
    pub fn set<T: Serialize>(&self, key: impl Into<String>, value: &T, ttl_secs: Option<u64>) {
        let Ok(value) = serde_json::to_value(value) else {
            return;
        };
        let ttl = ttl_secs.map_or(self.default_ttl, Duration::from_secs);
        self.lock().insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Removes one entry unconditionally.
    pub fn delete(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Whether `key` is present and unexpired (same eviction side effect as
    /// [`MemoryCache::get`]).
    pub fn has(&self, key: &str) -> bool {
        self.get::<serde_json::Value>(key).is_some()
    }
}

struct StoredCatalog {
    catalog: CachedCatalog,
    expires_at: Instant,
}

struct CatalogState {
    entry: Option<StoredCatalog>,
    version: u64,
}

/// In-process catalog cache, the development fallback backend.
pub struct MemoryCatalogCache {
    state: Mutex<CatalogState>,
    ttl: Duration,
}

impl MemoryCatalogCache {
    /// Creates a catalog cache with the given TTL in seconds.
    #[must_use]
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            state: Mutex::new(CatalogState {
                entry: None,
                version: 0,
            }),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CatalogCache for MemoryCatalogCache {
    async fn read(&self) -> Option<CachedCatalog> {
        let state = self.lock();
        state
            .entry
            .as_ref()
            .filter(|e| Instant::now() <= e.expires_at)
            .map(|e| e.catalog.clone())
    }

    async fn read_any(&self) -> Option<CachedCatalog> {
        // Stale-on-error: the snapshot is kept past expiry until the next
        // write or invalidate replaces it.
        let state = self.lock();
        state.entry.as_ref().map(|e| e.catalog.clone())
    }

    async fn write(&self, prompts: &[PromptRecord], categories: &[String]) -> bool {
        let now = Utc::now();
        let mut state = self.lock();
        state.version += 1;
        state.entry = Some(StoredCatalog {
            catalog: CachedCatalog {
                prompts: prompts.to_vec(),
                categories: categories.to_vec(),
                last_sync: now.to_rfc3339(),
                version: state.version,
            },
            expires_at: Instant::now() + self.ttl,
        });
        tracing::info!(version = state.version, "memory catalog cache updated");
        true
    }

    async fn invalidate(&self) {
        self.lock().entry = None;
        tracing::info!("memory catalog cache invalidated");
    }

    async fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        let state = self.lock();
        let entry = state
            .entry
            .as_ref()
            .filter(|e| Instant::now() <= e.expires_at)?;
        if entry.catalog.last_sync == UNKNOWN_SYNC {
            return None;
        }
        DateTime::parse_from_rfc3339(&entry.catalog.last_sync)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}
