//! Bitable API client.
//!
//! Talks to the open-platform Bitable record API: tenant token exchange,
//! page-by-page record listing, and normalization of the loosely-typed
//! field map into [`PromptRecord`]s. Field names come in two vocabularies
//! (the canonical English one and the legacy localized one); the canonical
//! name wins when both are present.

use crate::cache::MemoryCache;
use crate::config::SourceConfig;
use crate::models::PromptRecord;
use crate::source::PromptSource;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Production API base.
pub const DEFAULT_BASE_URL: &str = "https://open.feishu.cn/open-apis";

/// Records requested per page.
const PAGE_SIZE: u32 = 100;

/// Hard ceiling on pages per fetch. The upstream is trusted to terminate
/// pagination, but a `has_more` that never clears or a continuation token
/// that stops advancing must not spin forever.
const MAX_PAGES: usize = 100;

/// Renew the tenant token this many seconds before its reported expiry.
const TOKEN_EXPIRY_BUFFER_SECS: u64 = 60;

const TOKEN_CACHE_KEY: &str = "bitable:tenant_token";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    tenant_access_token: Option<String>,
    expire: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<RecordsPage>,
}

#[derive(Debug, Deserialize)]
struct RecordsPage {
    #[serde(default)]
    items: Vec<RawRecord>,
    #[serde(default)]
    has_more: bool,
    page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    record_id: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

/// Client for the Bitable record API.
pub struct BitableClient {
    config: SourceConfig,
    http: reqwest::Client,
    token_cache: MemoryCache,
}

impl BitableClient {
    /// Creates a client from source configuration.
    #[must_use]
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            // TTL is set per token from the upstream-reported expiry.
            token_cache: MemoryCache::new(0),
        }
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Returns a tenant access token, reusing the cached one while it has
    /// more than the renewal buffer left.
    async fn tenant_access_token(&self) -> Result<String> {
        if let Some(token) = self.token_cache.get::<String>(TOKEN_CACHE_KEY) {
            return Ok(token);
        }

        let app_id = self
            .config
            .app_id
            .as_deref()
            .ok_or_else(|| Error::Configuration("BITABLE_APP_ID".to_string()))?;
        let app_secret = self
            .config
            .app_secret
            .as_deref()
            .ok_or_else(|| Error::Configuration("BITABLE_APP_SECRET".to_string()))?;

        let url = format!("{}/auth/v3/tenant_access_token/internal", self.base_url());
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "app_id": app_id, "app_secret": app_secret }))
            .send()
            .await
            .map_err(|e| Error::Upstream {
                operation: "tenant_access_token".to_string(),
                cause: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::Upstream {
                operation: "tenant_access_token".to_string(),
                cause: format!("status {}", response.status()),
            });
        }

        let body: TokenResponse = response.json().await.map_err(|e| Error::Upstream {
            operation: "tenant_access_token".to_string(),
            cause: e.to_string(),
        })?;

        let token = match (body.code, body.tenant_access_token) {
            (0, Some(token)) => token,
            (code, _) => {
                return Err(Error::Upstream {
                    operation: "tenant_access_token".to_string(),
                    cause: format!("code {code}: {}", body.msg),
                });
            }
        };

        let ttl = body
            .expire
            .unwrap_or(7200)
            .saturating_sub(TOKEN_EXPIRY_BUFFER_SECS);
        self.token_cache.set(TOKEN_CACHE_KEY, &token, Some(ttl));

        Ok(token)
    }

    async fn fetch_page(
        &self,
        token: &str,
        app_token: &str,
        table_id: &str,
        page_token: Option<&str>,
    ) -> Result<RecordsPage> {
        let url = format!(
            "{}/bitable/v1/apps/{app_token}/tables/{table_id}/records",
            self.base_url()
        );

        let mut request = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[("page_size", PAGE_SIZE.to_string())]);
        if let Some(page_token) = page_token {
            request = request.query(&[("page_token", page_token)]);
        }

        let response = request.send().await.map_err(|e| Error::Upstream {
            operation: "list_records".to_string(),
            cause: e.to_string(),
        })?;

        let status = response.status();
        let body: RecordsResponse = response.json().await.map_err(|e| Error::Upstream {
            operation: "list_records".to_string(),
            cause: e.to_string(),
        })?;

        if !status.is_success() || body.code != 0 {
            tracing::error!(
                status = %status,
                code = body.code,
                msg = %body.msg,
                "bitable API returned an error"
            );
            return Err(Error::Upstream {
                operation: "list_records".to_string(),
                cause: format!("status {status}, code {}: {}", body.code, body.msg),
            });
        }

        body.data.ok_or_else(|| Error::Upstream {
            operation: "list_records".to_string(),
            cause: "response carried no data".to_string(),
        })
    }
}

#[async_trait]
impl PromptSource for BitableClient {
    async fn fetch_records(&self) -> Result<Vec<PromptRecord>> {
        let app_token = self
            .config
            .app_token
            .as_deref()
            .ok_or_else(|| Error::Configuration("BITABLE_APP_TOKEN".to_string()))?;
        let table_id = self
            .config
            .table_id
            .as_deref()
            .ok_or_else(|| Error::Configuration("BITABLE_TABLE_ID".to_string()))?;

        let token = self.tenant_access_token().await?;

        let mut prompts = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0_usize;

        loop {
            let page = self
                .fetch_page(&token, app_token, table_id, page_token.as_deref())
                .await?;
            pages += 1;

            for item in page.items {
                match normalize_record(&item.record_id, &item.fields) {
                    Some(prompt) => prompts.push(prompt),
                    None => {
                        tracing::debug!(record_id = %item.record_id, "skipping record without a title");
                    }
                }
            }

            if !page.has_more {
                break;
            }
            let next = page.page_token;
            if next.is_none() || next == page_token {
                tracing::warn!(pages, "pagination token stopped advancing, stopping fetch");
                break;
            }
            if pages >= MAX_PAGES {
                tracing::warn!(pages, "page ceiling reached, stopping fetch");
                break;
            }
            page_token = next;
        }

        tracing::info!(prompts = prompts.len(), pages, "fetched bitable records");
        Ok(prompts)
    }
}

/// Extracts display text from either a plain string or a rich-text segment
/// list (segment `text` members concatenated in order).
fn text_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(segments)) => segments
            .iter()
            .filter_map(|seg| seg.get("text").and_then(Value::as_str))
            .collect(),
        _ => String::new(),
    }
}

/// Extracts a category label from either a string or a list (first element).
fn category_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .first()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

/// Looks a field up by its canonical name, falling back to the legacy
/// localized alias.
fn field<'a>(fields: &'a Map<String, Value>, primary: &str, alias: &str) -> Option<&'a Value> {
    fields.get(primary).or_else(|| fields.get(alias))
}

/// Normalizes one raw record; `None` when the title is empty.
///
/// Timestamps are stamped here rather than copied from upstream.
fn normalize_record(record_id: &str, fields: &Map<String, Value>) -> Option<PromptRecord> {
    let title = text_value(field(fields, "title", "名字"));
    if title.is_empty() {
        return None;
    }

    let tags = match fields.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    let now = Utc::now();
    Some(PromptRecord {
        id: record_id.to_string(),
        title,
        description: text_value(field(fields, "description", "描述")),
        content: text_value(field(fields, "content", "内容")),
        category: category_value(field(fields, "category", "tag")),
        tags,
        created_at: now,
        updated_at: now,
    })
}
