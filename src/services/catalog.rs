//! Cached catalog read path.
//!
//! Cache hit: return it. Miss: fetch directly, return immediately, and warm
//! the cache from a spawned task so the caller never waits on the write.
//! Fetch failure: prefer any cached copy, fresh or not, over an error.

use crate::Result;
use crate::cache::CatalogCache;
use crate::models::CatalogPage;
use crate::source::{PromptSource, extract_categories};
use std::sync::Arc;
use tracing::instrument;

/// Service behind the `/api/prompts` read endpoint.
pub struct CatalogService {
    source: Arc<dyn PromptSource>,
    cache: Arc<dyn CatalogCache>,
}

impl CatalogService {
    /// Creates a new catalog service.
    #[must_use]
    pub fn new(source: Arc<dyn PromptSource>, cache: Arc<dyn CatalogCache>) -> Self {
        Self { source, cache }
    }

    /// Returns the catalog, preferring the cache.
    ///
    /// # Errors
    ///
    /// Returns the fetch error only when the upstream call fails and no
    /// cached copy of any age exists.
    #[instrument(skip(self), fields(operation = "catalog.get_prompts"))]
    pub async fn get_prompts(&self) -> Result<CatalogPage> {
        if let Some(cached) = self.cache.read().await {
            tracing::info!(
                version = cached.version,
                last_sync = %cached.last_sync,
                "returning cached catalog"
            );
            return Ok(CatalogPage {
                prompts: cached.prompts,
                categories: cached.categories,
                from_cache: true,
            });
        }

        tracing::info!("catalog cache miss, fetching from source");
        match self.source.fetch_records().await {
            Ok(prompts) => {
                let categories = extract_categories(&prompts);
                self.warm_cache(prompts.clone(), categories.clone());
                Ok(CatalogPage {
                    prompts,
                    categories,
                    from_cache: false,
                })
            }
            Err(e) => {
                if let Some(stale) = self.cache.read_any().await {
                    tracing::warn!(error = %e, "upstream fetch failed, serving stale catalog");
                    return Ok(CatalogPage {
                        prompts: stale.prompts,
                        categories: stale.categories,
                        from_cache: true,
                    });
                }
                Err(e)
            }
        }
    }

    /// Writes the catalog to the cache without blocking the caller.
    ///
    /// A failed warm is logged and otherwise lost until the next trigger.
    fn warm_cache(&self, prompts: Vec<crate::models::PromptRecord>, categories: Vec<String>) {
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            if !cache.write(&prompts, &categories).await {
                tracing::error!("background catalog warm failed");
            }
        });
    }
}
