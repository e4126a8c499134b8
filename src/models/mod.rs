//! Data models for promptdeck.

mod catalog;

pub use catalog::{CachedCatalog, CatalogPage, PromptRecord, SyncResult};
