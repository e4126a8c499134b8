//! Scheduled sync endpoint.
//!
//! Invoked by an external scheduler (e.g. hourly). The staleness policy
//! gates the actual work so an aggressive scheduler cannot cause redundant
//! full refreshes.

use crate::http::AppState;
use crate::models::SyncResult;
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Serialize)]
struct CronSkipped {
    success: bool,
    message: &'static str,
    synced: bool,
}

// `success` comes from the flattened result.
#[derive(Serialize)]
struct CronSynced {
    message: &'static str,
    synced: bool,
    #[serde(flatten)]
    result: SyncResult,
}

#[derive(Serialize)]
struct CronError {
    success: bool,
    message: &'static str,
    error: Option<String>,
}

/// `GET /api/cron/sync`
pub async fn run(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(secret) = &state.config.cron_secret {
        let expected = format!("Bearer {secret}");
        let provided = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            tracing::warn!("unauthorized cron request");
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "Unauthorized" })),
            )
                .into_response();
        }
    }

    if !state.cache.is_stale().await {
        tracing::info!("cache is still fresh, skipping sync");
        return Json(CronSkipped {
            success: true,
            message: "Cache is fresh, sync skipped",
            synced: false,
        })
        .into_response();
    }

    tracing::info!("cache is stale, starting sync");
    let result = state.sync.sync().await;

    if result.success {
        tracing::info!(prompts = result.prompt_count, "cron sync completed");
        Json(CronSynced {
            message: "Sync completed successfully",
            synced: true,
            result,
        })
        .into_response()
    } else {
        tracing::error!(error = ?result.error, "cron sync failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(CronError {
                success: false,
                message: "Sync failed",
                error: result.error,
            }),
        )
            .into_response()
    }
}
