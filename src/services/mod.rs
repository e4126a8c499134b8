//! Service layer: the sync orchestrator and the cached read path.

mod catalog;
mod sync;

pub use catalog::CatalogService;
pub use sync::SyncService;
