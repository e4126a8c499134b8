//! Catalog data model.
//!
//! JSON field names are camelCase to stay wire-compatible with the catalog
//! UI and with any catalog snapshots already sitting in the durable cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One catalog entry, normalized from a Bitable record.
///
/// Invariants within one fetched batch: `id` is unique and `title` is
/// non-empty (records lacking a title are dropped during normalization).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRecord {
    /// Source-assigned stable record identifier.
    pub id: String,
    /// Display title. Always non-empty for retained records.
    pub title: String,
    /// Short description.
    pub description: String,
    /// The full prompt text.
    pub content: String,
    /// Single category label; may be empty.
    pub category: String,
    /// Ordered tag labels; may be empty.
    pub tags: Vec<String>,
    /// Stamped at fetch time; upstream timestamps are not trusted.
    pub created_at: DateTime<Utc>,
    /// Stamped at fetch time; upstream timestamps are not trusted.
    pub updated_at: DateTime<Utc>,
}

/// The catalog snapshot as stored in the durable cache.
///
/// The four fields live under independent keys with independent TTLs, so a
/// reader treats "prompts present but categories absent" as a miss; when
/// only `last_sync` or `version` is missing, the sentinels `"unknown"` and
/// `0` are substituted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedCatalog {
    /// The prompt batch.
    pub prompts: Vec<PromptRecord>,
    /// Sorted unique category labels derived from the batch.
    pub categories: Vec<String>,
    /// ISO-8601 timestamp of the last successful sync, or `"unknown"`.
    pub last_sync: String,
    /// Monotonically increasing sync counter; `0` when missing.
    pub version: u64,
}

/// Result of one sync attempt. Transient; never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// Whether the sync succeeded end to end.
    pub success: bool,
    /// Number of prompts fetched and stored.
    pub prompt_count: usize,
    /// Number of distinct categories stored.
    pub category_count: usize,
    /// When the sync attempt started.
    pub sync_time: DateTime<Utc>,
    /// Error message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResult {
    /// Builds a success result.
    #[must_use]
    pub const fn completed(
        prompt_count: usize,
        category_count: usize,
        sync_time: DateTime<Utc>,
    ) -> Self {
        Self {
            success: true,
            prompt_count,
            category_count,
            sync_time,
            error: None,
        }
    }

    /// Builds a failure result with zero counts.
    #[must_use]
    pub const fn failed(sync_time: DateTime<Utc>, error: String) -> Self {
        Self {
            success: false,
            prompt_count: 0,
            category_count: 0,
            sync_time,
            error: Some(error),
        }
    }
}

/// What the read path hands to callers.
#[derive(Debug, Clone)]
pub struct CatalogPage {
    /// The prompt batch.
    pub prompts: Vec<PromptRecord>,
    /// Sorted unique category labels.
    pub categories: Vec<String>,
    /// Whether the data came from the cache rather than a direct fetch.
    pub from_cache: bool,
}
