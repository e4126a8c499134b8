//! # Promptdeck
//!
//! A searchable AI prompt catalog service backed by a Bitable table.
//!
//! Promptdeck fronts a spreadsheet-like "Bitable" table of prompts with a
//! cached read path, a webhook-triggered refresh, and a scheduled sync
//! endpoint. The catalog itself is owned upstream; this service owns the
//! cache/sync behavior in between.
//!
//! ## Architecture
//!
//! - **Source** (`source`): Bitable API client with pagination and field
//!   normalization, behind the [`PromptSource`] trait
//! - **Cache** (`cache`): one [`CatalogCache`] capability with two backends,
//!   Redis for production and an in-process map for development
//! - **Services** (`services`): the sync orchestrator and the cached read path
//! - **Webhook** (`webhook`): envelope decryption, signature verification,
//!   and replay deduplication for upstream change notifications
//! - **HTTP** (`http`): the axum surface (`/api/prompts`, `/api/cron/sync`,
//!   `/api/webhook/bitable`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use promptdeck::services::CatalogService;
//!
//! let service = CatalogService::new(source, cache);
//! let page = service.get_prompts().await?;
//! println!("{} prompts ({} categories)", page.prompts.len(), page.categories.len());
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cache;
pub mod config;
pub mod http;
pub mod models;
pub mod observability;
pub mod services;
pub mod source;
pub mod webhook;

// Re-exports for convenience
pub use cache::{CatalogCache, MemoryCache, MemoryCatalogCache, RedisCatalogCache};
pub use config::AppConfig;
pub use models::{CachedCatalog, CatalogPage, PromptRecord, SyncResult};
pub use services::{CatalogService, SyncService};
pub use source::{BitableClient, PromptSource, extract_categories};

/// Error type for promptdeck operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Configuration` | Required source credentials or identifiers are absent |
/// | `Upstream` | The Bitable API call fails or returns a non-zero code |
/// | `Store` | A read/write against the durable cache fails |
/// | `Validation` | A webhook payload is malformed or fails verification |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Required configuration is missing.
    ///
    /// Not retryable; surfaced to users as a distinct "misconfiguration"
    /// message on the read endpoint.
    #[error("missing configuration: {0}")]
    Configuration(String),

    /// An upstream Bitable API call failed.
    ///
    /// Raised when:
    /// - The HTTP transport fails (connect, timeout)
    /// - The API returns a non-success status
    /// - The API returns a non-zero application `code`
    ///
    /// Retryable by re-invoking sync later.
    #[error("upstream request '{operation}' failed: {cause}")]
    Upstream {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A durable cache operation failed.
    ///
    /// Never propagated to read-path callers; degrades to a cache miss.
    #[error("cache operation '{operation}' failed: {cause}")]
    Store {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A webhook payload was malformed or failed verification.
    ///
    /// Rejected at the boundary; no side effects are triggered.
    #[error("invalid webhook payload: {0}")]
    Validation(String),
}

impl Error {
    /// Returns `true` for errors caused by missing configuration.
    ///
    /// The read endpoint uses this to pick a user-facing message that
    /// distinguishes "server misconfiguration" from transient failures.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Result type alias for promptdeck operations.
pub type Result<T> = std::result::Result<T, Error>;
