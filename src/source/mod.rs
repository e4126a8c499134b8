//! Upstream prompt source.
//!
//! The catalog lives in a third-party Bitable table; this module fetches
//! and normalizes it. Everything behind [`PromptSource`] is replaceable in
//! tests with an in-memory fake.

mod bitable;

pub use bitable::BitableClient;

use crate::Result;
use crate::models::PromptRecord;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// A source of normalized prompt records.
#[async_trait]
pub trait PromptSource: Send + Sync {
    /// Fetches the full record set, paginating until exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] when credentials or
    /// identifiers are missing, [`crate::Error::Upstream`] when the remote
    /// call fails.
    async fn fetch_records(&self) -> Result<Vec<PromptRecord>>;
}

/// Derives the sorted, de-duplicated set of non-empty category labels.
#[must_use]
pub fn extract_categories(records: &[PromptRecord]) -> Vec<String> {
    records
        .iter()
        .filter(|r| !r.category.is_empty())
        .map(|r| r.category.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
