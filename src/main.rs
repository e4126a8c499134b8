//! Binary entry point for promptdeck.
//!
//! Wires configuration, the cache backend, and the Bitable client into the
//! axum router and serves it.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::Parser;
use promptdeck::cache::{CatalogCache, MemoryCatalogCache, RedisCatalogCache};
use promptdeck::config::AppConfig;
use promptdeck::http::{AppState, router};
use promptdeck::observability;
use promptdeck::source::{BitableClient, PromptSource};
use std::net::SocketAddr;
use std::sync::Arc;

/// Promptdeck - prompt catalog service backed by a Bitable table.
#[derive(Parser)]
#[command(name = "promptdeck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the real environment still applies.
    dotenvy::dotenv().ok();
    observability::init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    let source: Arc<dyn PromptSource> = Arc::new(BitableClient::new(config.source.clone()));

    let cache: Arc<dyn CatalogCache> = match &config.redis_url {
        Some(url) => {
            tracing::info!("using redis catalog cache");
            Arc::new(
                RedisCatalogCache::connect(url)
                    .await
                    .context("failed to connect to redis")?,
            )
        }
        None => {
            tracing::info!(
                ttl_secs = config.memory_ttl_secs,
                "REDIS_URL not set, using in-process memory cache"
            );
            Arc::new(MemoryCatalogCache::new(config.memory_ttl_secs))
        }
    };

    let app = router(AppState::new(config, source, cache));

    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("failed to bind {}", cli.bind))?;
    tracing::info!(addr = %cli.bind, "promptdeck listening");

    axum::serve(listener, app)
        .await
        .context("server terminated")?;

    Ok(())
}
