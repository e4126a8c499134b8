//! Redis-backed durable catalog cache.
//!
//! The catalog is stored under four independently-expiring keys so that a
//! deployment can share one Redis with other tenants of the `prompts:`
//! prefix. The four keys are written concurrently, not transactionally;
//! the read side treats any partial state as a miss.

use crate::cache::{CATALOG_TTL_SECS, CatalogCache, UNKNOWN_SYNC};
use crate::models::{CachedCatalog, PromptRecord};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Key holding the serialized prompt batch.
pub const PROMPTS_KEY: &str = "prompts:data";
/// Key holding the serialized category list.
pub const CATEGORIES_KEY: &str = "prompts:categories";
/// Key holding the last-sync timestamp.
pub const LAST_SYNC_KEY: &str = "prompts:last_sync";
/// Key holding the monotonically increasing sync version.
pub const VERSION_KEY: &str = "prompts:version";

/// Durable catalog cache over Redis.
pub struct RedisCatalogCache {
    conn: ConnectionManager,
}

impl RedisCatalogCache {
    /// Connects to Redis and returns a catalog cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| Error::Store {
            operation: "redis_connect".to_string(),
            cause: e.to_string(),
        })?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::Store {
                operation: "redis_connect".to_string(),
                cause: e.to_string(),
            })?;
        Ok(Self { conn })
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await.map_err(|e| Error::Store {
            operation: format!("redis_get {key}"),
            cause: e.to_string(),
        })?;
        Ok(raw.and_then(|s| serde_json::from_str(&s).ok()))
    }

    async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value).map_err(|e| Error::Store {
            operation: format!("redis_serialize {key}"),
            cause: e.to_string(),
        })?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, payload, CATALOG_TTL_SECS)
            .await
            .map_err(|e| Error::Store {
                operation: format!("redis_set {key}"),
                cause: e.to_string(),
            })?;
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.map_err(|e| Error::Store {
            operation: format!("redis_del {key}"),
            cause: e.to_string(),
        })?;
        Ok(())
    }

    async fn read_inner(&self) -> Result<Option<CachedCatalog>> {
        let (prompts, categories, last_sync, version) = tokio::join!(
            self.get_json::<Vec<PromptRecord>>(PROMPTS_KEY),
            self.get_json::<Vec<String>>(CATEGORIES_KEY),
            self.get_json::<String>(LAST_SYNC_KEY),
            self.get_json::<u64>(VERSION_KEY),
        );
        let (Some(prompts), Some(categories)) = (prompts?, categories?) else {
            return Ok(None);
        };
        Ok(Some(CachedCatalog {
            prompts,
            categories,
            last_sync: last_sync?.unwrap_or_else(|| UNKNOWN_SYNC.to_string()),
            version: version?.unwrap_or(0),
        }))
    }

    async fn write_inner(&self, prompts: &[PromptRecord], categories: &[String]) -> Result<u64> {
        let current: Option<u64> = self.get_json(VERSION_KEY).await?;
        let version = current.unwrap_or(0) + 1;
        let now = Utc::now().to_rfc3339();

        let (p, c, l, v) = tokio::join!(
            self.set_json(PROMPTS_KEY, &prompts),
            self.set_json(CATEGORIES_KEY, &categories),
            self.set_json(LAST_SYNC_KEY, &now),
            self.set_json(VERSION_KEY, &version),
        );
        p?;
        c?;
        l?;
        v?;
        Ok(version)
    }
}

#[async_trait]
impl CatalogCache for RedisCatalogCache {
    async fn read(&self) -> Option<CachedCatalog> {
        match self.read_inner().await {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::error!(error = %e, "failed to read catalog from redis");
                None
            }
        }
    }

    async fn write(&self, prompts: &[PromptRecord], categories: &[String]) -> bool {
        match self.write_inner(prompts, categories).await {
            Ok(version) => {
                tracing::info!(version, prompts = prompts.len(), "redis catalog cache updated");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to write catalog to redis");
                false
            }
        }
    }

    async fn invalidate(&self) {
        // Version key survives so the counter keeps increasing across
        // invalidations.
        let (p, c, l) = tokio::join!(
            self.delete_key(PROMPTS_KEY),
            self.delete_key(CATEGORIES_KEY),
            self.delete_key(LAST_SYNC_KEY),
        );
        for result in [p, c, l] {
            if let Err(e) = result {
                tracing::error!(error = %e, "failed to invalidate redis catalog cache");
            }
        }
        tracing::info!("redis catalog cache invalidated");
    }

    async fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        match self.get_json::<String>(LAST_SYNC_KEY).await {
            Ok(raw) => raw.and_then(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .ok()
                    .map(|t| t.with_timezone(&Utc))
            }),
            Err(e) => {
                tracing::error!(error = %e, "failed to read last sync time from redis");
                None
            }
        }
    }
}
