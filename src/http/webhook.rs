//! Webhook endpoint.
//!
//! The upstream notifier retries any non-success response, so the policy
//! here is deliberate: only an unparseable body (400) or a failed
//! verification (401) is rejected; every condition past those is
//! acknowledged with `{code: 0}` even when internal processing went wrong.

use crate::http::AppState;
use crate::webhook::{EventPayload, decrypt_event, verify_signature};
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use std::sync::{Arc, PoisonError};

const SIGNATURE_HEADER: &str = "x-lark-signature";
const TIMESTAMP_HEADER: &str = "x-lark-request-timestamp";
const NONCE_HEADER: &str = "x-lark-request-nonce";

fn ok_ack() -> Response {
    Json(serde_json::json!({ "code": 0, "msg": "ok" })).into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// `POST /api/webhook/bitable`
#[allow(clippy::too_many_lines)]
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    // Parse, decrypting the envelope first when one is present. Decryption
    // failures land here too: an envelope that cannot be opened is as
    // unparseable as malformed JSON.
    let payload = match parse_payload(&body, state.config.encrypt_key.as_deref()) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse webhook payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "Invalid JSON" })),
            )
                .into_response();
        }
    };

    // URL verification challenge: echo and stop. Deliberately bypasses the
    // token check so endpoint registration works before config is final.
    if payload.is_url_verification() {
        tracing::info!("responding to URL verification challenge");
        return Json(serde_json::json!({ "challenge": payload.challenge })).into_response();
    }

    if let Some(expected) = &state.config.verification_token
        && payload.verification_token() != Some(expected.as_str())
    {
        tracing::warn!("webhook token verification failed");
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Unauthorized" })),
        )
            .into_response();
    }

    if let Some(key) = &state.config.encrypt_key {
        let signature = header_str(&headers, SIGNATURE_HEADER);
        if !signature.is_empty()
            && !verify_signature(
                header_str(&headers, TIMESTAMP_HEADER),
                header_str(&headers, NONCE_HEADER),
                &body,
                signature,
                key,
            )
        {
            tracing::warn!("webhook signature verification failed");
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "Invalid signature" })),
            )
                .into_response();
        }
    }

    // Replay suppression. A replayed delivery is still acknowledged so the
    // notifier stops resending it.
    if let Some(event_id) = payload.event_id() {
        let admitted = state
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event_id);
        if !admitted {
            tracing::info!(event_id, "event already processed, skipping");
            return ok_ack();
        }
    }

    if payload.is_record_changed() {
        if let Some(target) = &state.config.source.table_id
            && payload.table_id() != Some(target.as_str())
        {
            tracing::info!(
                table_id = ?payload.table_id(),
                "event is for a different table, ignoring"
            );
            return ok_ack();
        }

        tracing::info!("bitable record changed, triggering sync");
        let sync = Arc::clone(&state.sync);
        tokio::spawn(async move {
            let result = sync.sync().await;
            if !result.success {
                tracing::error!(error = ?result.error, "webhook-triggered sync failed");
            }
        });
    }

    ok_ack()
}

/// Parses the raw body, opening the encrypted envelope when both the
/// envelope and a key are present.
fn parse_payload(body: &str, encrypt_key: Option<&str>) -> crate::Result<EventPayload> {
    let parsed: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| crate::Error::Validation(format!("invalid JSON: {e}")))?;

    if let (Some(envelope), Some(key)) = (
        parsed.get("encrypt").and_then(serde_json::Value::as_str),
        encrypt_key,
    ) {
        let plaintext = decrypt_event(envelope, key)?;
        return serde_json::from_str(&plaintext)
            .map_err(|e| crate::Error::Validation(format!("invalid decrypted JSON: {e}")));
    }

    serde_json::from_value(parsed)
        .map_err(|e| crate::Error::Validation(format!("invalid event payload: {e}")))
}

/// `GET /api/webhook/bitable`: trivial health check.
pub async fn health() -> Response {
    Json(serde_json::json!({
        "status": "ok",
        "endpoint": "Bitable Webhook",
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response()
}
