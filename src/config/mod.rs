//! Configuration management.
//!
//! All configuration is environment-provided. The one structural decision
//! made here is backend selection: the presence of `REDIS_URL` selects the
//! durable Redis cache, its absence selects the in-process memory cache.
//! That check happens once at startup, not per call site.

use std::env;

/// Default in-memory cache TTL in seconds when `CACHE_TTL` is unset.
pub const DEFAULT_MEMORY_TTL_SECS: u64 = 300;

/// Credentials and identifiers for the upstream Bitable source.
///
/// Fields stay optional here; the source client raises
/// [`crate::Error::Configuration`] at call time when one is missing, so a
/// partially configured process can still serve the webhook health check.
#[derive(Debug, Clone, Default)]
pub struct SourceConfig {
    /// Application identifier (`BITABLE_APP_ID`).
    pub app_id: Option<String>,
    /// Application secret (`BITABLE_APP_SECRET`).
    pub app_secret: Option<String>,
    /// Bitable app token (`BITABLE_APP_TOKEN`).
    pub app_token: Option<String>,
    /// Target table identifier (`BITABLE_TABLE_ID`).
    pub table_id: Option<String>,
    /// API base URL override (`BITABLE_API_BASE`).
    pub base_url: Option<String>,
}

/// Main configuration for promptdeck.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Upstream source credentials and identifiers.
    pub source: SourceConfig,
    /// Redis connection URL; `None` selects the memory cache fallback.
    pub redis_url: Option<String>,
    /// Webhook envelope decryption key (`WEBHOOK_ENCRYPT_KEY`).
    pub encrypt_key: Option<String>,
    /// Webhook verification token (`WEBHOOK_VERIFICATION_TOKEN`).
    pub verification_token: Option<String>,
    /// Bearer secret for the scheduled sync endpoint (`CRON_SECRET`).
    pub cron_secret: Option<String>,
    /// Default TTL for the in-process memory cache, in seconds.
    pub memory_ttl_secs: u64,
}

impl AppConfig {
    /// Creates a configuration with default values and no credentials.
    #[must_use]
    pub fn new() -> Self {
        Self {
            memory_ttl_secs: DEFAULT_MEMORY_TTL_SECS,
            ..Self::default()
        }
    }

    /// Loads configuration from the process environment.
    ///
    /// Call `dotenvy::dotenv()` first if a `.env` file should participate.
    #[must_use]
    pub fn from_env() -> Self {
        let memory_ttl_secs = env::var("CACHE_TTL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MEMORY_TTL_SECS);

        Self {
            source: SourceConfig {
                app_id: non_empty_var("BITABLE_APP_ID"),
                app_secret: non_empty_var("BITABLE_APP_SECRET"),
                app_token: non_empty_var("BITABLE_APP_TOKEN"),
                table_id: non_empty_var("BITABLE_TABLE_ID"),
                base_url: non_empty_var("BITABLE_API_BASE"),
            },
            redis_url: non_empty_var("REDIS_URL"),
            encrypt_key: non_empty_var("WEBHOOK_ENCRYPT_KEY"),
            verification_token: non_empty_var("WEBHOOK_VERIFICATION_TOKEN"),
            cron_secret: non_empty_var("CRON_SECRET"),
            memory_ttl_secs,
        }
    }

    /// Sets the source configuration.
    #[must_use]
    pub fn with_source(mut self, source: SourceConfig) -> Self {
        self.source = source;
        self
    }

    /// Sets the webhook verification token.
    #[must_use]
    pub fn with_verification_token(mut self, token: impl Into<String>) -> Self {
        self.verification_token = Some(token.into());
        self
    }

    /// Sets the webhook envelope decryption key.
    #[must_use]
    pub fn with_encrypt_key(mut self, key: impl Into<String>) -> Self {
        self.encrypt_key = Some(key.into());
        self
    }

    /// Sets the cron bearer secret.
    #[must_use]
    pub fn with_cron_secret(mut self, secret: impl Into<String>) -> Self {
        self.cron_secret = Some(secret.into());
        self
    }
}

impl SourceConfig {
    /// Sets the application identifier.
    #[must_use]
    pub fn with_app_id(mut self, id: impl Into<String>) -> Self {
        self.app_id = Some(id.into());
        self
    }

    /// Sets the application secret.
    #[must_use]
    pub fn with_app_secret(mut self, secret: impl Into<String>) -> Self {
        self.app_secret = Some(secret.into());
        self
    }

    /// Sets the Bitable app token.
    #[must_use]
    pub fn with_app_token(mut self, token: impl Into<String>) -> Self {
        self.app_token = Some(token.into());
        self
    }

    /// Sets the target table identifier.
    #[must_use]
    pub fn with_table_id(mut self, id: impl Into<String>) -> Self {
        self.table_id = Some(id.into());
        self
    }

    /// Sets the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

/// Reads an environment variable, treating empty strings as unset.
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}
