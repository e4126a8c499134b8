//! Catalog read endpoint.

use crate::http::AppState;
use crate::models::PromptRecord;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// User-facing message for missing server configuration.
const CONFIG_ERROR_MESSAGE: &str = "服务配置错误，请联系管理员";
/// User-facing message for transient failures.
const GENERIC_ERROR_MESSAGE: &str = "数据加载失败，请稍后重试";

#[derive(Serialize)]
struct PromptsResponse {
    success: bool,
    data: Vec<PromptRecord>,
    total: usize,
    categories: Vec<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: &'static str,
    message: &'static str,
}

/// `GET /api/prompts`
///
/// Serves the catalog from the cache when possible; the service layer
/// already prefers a stale copy over an error, so reaching the error arm
/// means a cold cache coincided with an upstream failure.
pub async fn list(State(state): State<AppState>) -> Response {
    match state.catalog.get_prompts().await {
        Ok(page) => {
            let total = page.prompts.len();
            Json(PromptsResponse {
                success: true,
                data: page.prompts,
                total,
                categories: page.categories,
            })
            .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to serve prompts");
            let message = if e.is_configuration() {
                CONFIG_ERROR_MESSAGE
            } else {
                GENERIC_ERROR_MESSAGE
            };
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    success: false,
                    error: "FETCH_ERROR",
                    message,
                }),
            )
                .into_response()
        }
    }
}
