//! Catalog synchronization service.
//!
//! One sync attempt: fetch the full record set from the source, derive the
//! category list, overwrite the catalog cache as a batch. Every caller
//! (webhook dispatch, cron endpoint) gets a structured [`SyncResult`]:
//! failures are folded into the result, never raised.

use crate::cache::CatalogCache;
use crate::models::SyncResult;
use crate::source::{PromptSource, extract_categories};
use crate::{Error, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Service that refreshes the catalog cache from the upstream source.
pub struct SyncService {
    source: Arc<dyn PromptSource>,
    cache: Arc<dyn CatalogCache>,
}

impl SyncService {
    /// Creates a new sync service.
    #[must_use]
    pub fn new(source: Arc<dyn PromptSource>, cache: Arc<dyn CatalogCache>) -> Self {
        Self { source, cache }
    }

    /// Runs one sync attempt.
    ///
    /// Concurrent syncs are not serialized against each other: both fully
    /// overwrite, the version counter increments per attempt, and the last
    /// writer wins on content.
    #[instrument(skip(self), fields(operation = "catalog.sync"))]
    pub async fn sync(&self) -> SyncResult {
        let sync_time = Utc::now();
        let start = Instant::now();
        tracing::info!(%sync_time, "starting catalog sync");

        let result = self.sync_inner().await;

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!("catalog_sync_total", "status" => status).increment(1);
        metrics::histogram!("catalog_sync_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok((prompt_count, category_count)) => {
                tracing::info!(prompt_count, category_count, "catalog sync completed");
                SyncResult::completed(prompt_count, category_count, sync_time)
            }
            Err(e) => {
                tracing::error!(error = %e, "catalog sync failed");
                SyncResult::failed(sync_time, e.to_string())
            }
        }
    }

    async fn sync_inner(&self) -> Result<(usize, usize)> {
        let prompts = self.source.fetch_records().await?;
        let categories = extract_categories(&prompts);

        if !self.cache.write(&prompts, &categories).await {
            // A write that reports false is the same failure as a thrown
            // fetch error from the caller's point of view.
            return Err(Error::Store {
                operation: "write_catalog".to_string(),
                cause: "failed to save catalog to cache".to_string(),
            });
        }

        Ok((prompts.len(), categories.len()))
    }
}
