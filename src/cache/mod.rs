//! Catalog cache backends.
//!
//! One capability interface, [`CatalogCache`], with two implementations
//! chosen once at startup: [`RedisCatalogCache`] when `REDIS_URL` is
//! configured, [`MemoryCatalogCache`] otherwise (local development). Call
//! sites never branch on the environment themselves.

pub mod memory;
pub mod redis;

pub use self::memory::{MemoryCache, MemoryCatalogCache};
pub use self::redis::RedisCatalogCache;

use crate::models::{CachedCatalog, PromptRecord};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// TTL applied to every stored catalog field, in seconds.
pub const CATALOG_TTL_SECS: u64 = 3600;

/// A cached catalog older than this is considered stale.
pub const FRESHNESS_WINDOW_SECS: i64 = 3600;

/// Sentinel last-sync value when the timestamp field is missing.
pub const UNKNOWN_SYNC: &str = "unknown";

/// Shared catalog cache capability.
///
/// Read and write failures never escape this boundary: a failed read is a
/// miss, a failed write reports `false`. Callers decide what degradation
/// means for them.
#[async_trait]
pub trait CatalogCache: Send + Sync {
    /// Returns the cached catalog, or `None` on miss.
    ///
    /// A partial state (prompts without categories, or the reverse) counts
    /// as a miss; missing last-sync/version fields fall back to sentinels.
    async fn read(&self) -> Option<CachedCatalog>;

    /// Returns the most recent cached copy regardless of freshness.
    ///
    /// Backends whose storage hard-expires entries (Redis) cannot do better
    /// than [`CatalogCache::read`]; the memory backend overrides this to
    /// serve stale data during upstream outages.
    async fn read_any(&self) -> Option<CachedCatalog> {
        self.read().await
    }

    /// Stores a catalog batch, bumping the version counter.
    ///
    /// Returns `false` (and logs) on any underlying failure.
    async fn write(&self, prompts: &[PromptRecord], categories: &[String]) -> bool;

    /// Drops the cached catalog. Best-effort; the version counter survives.
    async fn invalidate(&self);

    /// Returns the timestamp of the last successful sync, if known.
    async fn last_sync_time(&self) -> Option<DateTime<Utc>>;

    /// Whether the cache is due for a refresh.
    async fn is_stale(&self) -> bool {
        is_stale_at(self.last_sync_time().await, Utc::now())
    }
}

/// Pure staleness check: no sync yet, or the last sync is older than the
/// freshness window.
#[must_use]
pub fn is_stale_at(last_sync: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    last_sync.is_none_or(|t| now - t > Duration::seconds(FRESHNESS_WINDOW_SECS))
}
