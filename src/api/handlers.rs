// API request handlers

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use tracing::Instrument;

use super::forward::redacted;
use super::models::{ModelsResponse, OllamaShowRequest, OllamaShowResponse, OllamaTagsResponse};
use super::AppState;
use crate::proxy::translate;

// Liveness probe
pub async fn root() -> Json<Value> {
    Json(json!({
        "status": "running",
        "message": "Ollama Proxy is active"
    }))
}

pub async fn openai_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let snapshot = state.registry.snapshot();
    Json(ModelsResponse::from_snapshot(&snapshot, chrono::Utc::now()))
}

pub async fn tags(State(state): State<AppState>) -> Json<OllamaTagsResponse> {
    let snapshot = state.registry.snapshot();
    Json(OllamaTagsResponse::from_snapshot(&snapshot, chrono::Utc::now()))
}

/// Body-read failures (size limit, aborted upload) as a JSON error.
fn body_rejection(rejection: BytesRejection) -> Response {
    tracing::warn!("Failed to read request body: {}", rejection.body_text());
    (
        rejection.status(),
        Json(json!({ "error": rejection.body_text() })),
    )
        .into_response()
}

pub async fn show(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => return body_rejection(rejection),
    };
    let request: OllamaShowRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid request body: {}", e) })),
            )
                .into_response();
        }
    };

    let model = request.effective_model();
    tracing::debug!(model = %model, "POST /api/show");

    let snapshot = state.registry.snapshot();
    match OllamaShowResponse::from_snapshot(&snapshot, model) {
        Some(response) => Json(response).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("model '{}' not found", model) })),
        )
            .into_response(),
    }
}

/// `ANY /v1/chat/*` - translate and relay to the configured upstream.
pub async fn chat_proxy(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => return body_rejection(rejection),
    };
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("chat", request_id = %request_id);

    async move {
        tracing::debug!(
            "Incoming request: {} {} headers={:?} body={}",
            method,
            uri,
            redacted(&headers),
            String::from_utf8_lossy(&body)
        );

        // The snapshot is dropped before any network I/O starts.
        let translated = {
            let snapshot = state.registry.snapshot();
            translate(&snapshot, method, &uri, &headers, body)
        };

        let translated = match translated {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("Rejecting chat request: {}", e);
                return e.into_response();
            }
        };

        tracing::info!(
            alias = %translated.alias,
            upstream_model = %translated.upstream_model,
            "Proxying chat request"
        );

        match state.forwarder.forward(translated).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }
    .instrument(span)
    .await
}

pub async fn not_found(uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("no route for {}", uri.path()) })),
    )
        .into_response()
}
