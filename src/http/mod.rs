//! HTTP surface.
//!
//! Three routes: the catalog read endpoint, the scheduled sync trigger, and
//! the upstream webhook. All shared state is constructed once and injected
//! through axum's typed state.

mod cron;
mod prompts;
mod webhook;

use crate::cache::CatalogCache;
use crate::config::AppConfig;
use crate::services::{CatalogService, SyncService};
use crate::source::PromptSource;
use crate::webhook::ProcessedEventRegistry;
use axum::Router;
use axum::routing::{get, post};
use std::sync::{Arc, Mutex};
use tower_http::trace::TraceLayer;

/// Shared per-process state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// The shared catalog cache.
    pub cache: Arc<dyn CatalogCache>,
    /// Cached read path.
    pub catalog: Arc<CatalogService>,
    /// Sync orchestrator.
    pub sync: Arc<SyncService>,
    /// Replay-suppression registry for webhook events.
    pub events: Arc<Mutex<ProcessedEventRegistry>>,
}

impl AppState {
    /// Wires up services over a source and a cache backend.
    #[must_use]
    pub fn new(config: AppConfig, source: Arc<dyn PromptSource>, cache: Arc<dyn CatalogCache>) -> Self {
        let catalog = Arc::new(CatalogService::new(Arc::clone(&source), Arc::clone(&cache)));
        let sync = Arc::new(SyncService::new(source, Arc::clone(&cache)));
        Self {
            config: Arc::new(config),
            cache,
            catalog,
            sync,
            events: Arc::new(Mutex::new(ProcessedEventRegistry::new())),
        }
    }
}

/// Builds the application router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/prompts", get(prompts::list))
        .route("/api/cron/sync", get(cron::run))
        .route(
            "/api/webhook/bitable",
            post(webhook::receive).get(webhook::health),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
