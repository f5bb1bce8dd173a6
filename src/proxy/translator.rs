// Request translator - turns an inbound chat request into an upstream request

use axum::http::{
    header::{self, HeaderName},
    HeaderMap, HeaderValue, Method, Uri,
};
use bytes::Bytes;
use reqwest::Url;
use serde_json::{Map, Value};

use super::registry::Snapshot;
use crate::config::ProviderEntry;
use crate::error::TranslationError;

/// Every request is sent to this endpoint under the provider's API base.
const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Headers that are never copied from the inbound request.
///
/// Hop-by-hop headers belong to the client connection; the rest are set by
/// the translator itself.
const SKIPPED_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
    "authorization",
];

fn should_forward_header(name: &HeaderName) -> bool {
    !SKIPPED_HEADERS.contains(&name.as_str())
}

/// Outbound call produced by [`translate`]. Lives for one request.
#[derive(Debug, Clone)]
pub struct TranslatedRequest {
    pub alias: String,
    pub upstream_model: String,
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// The two ways an inbound body is handled.
#[derive(Debug)]
enum InboundBody {
    /// A JSON object: the `model` field is read and rewritten.
    Object(Map<String, Value>),
    /// Anything else: forwarded byte-for-byte, no alias available.
    Opaque,
}

impl InboundBody {
    fn parse(body: &[u8]) -> Self {
        if body.is_empty() {
            tracing::warn!("Request body is empty; cannot determine model");
            return Self::Opaque;
        }

        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => Self::Object(map),
            Ok(other) => {
                tracing::warn!(
                    "Request body is JSON but not an object ({}); forwarding unmodified",
                    json_kind(&other)
                );
                Self::Opaque
            }
            Err(e) => {
                tracing::warn!("Failed to parse request body for model extraction: {}", e);
                Self::Opaque
            }
        }
    }

    fn model(&self) -> &str {
        match self {
            Self::Object(map) => map.get("model").and_then(Value::as_str).unwrap_or(""),
            Self::Opaque => "",
        }
    }

    /// Body bytes for the upstream. Falls back to `original` if the rewritten
    /// object cannot be serialized.
    fn into_upstream_bytes(self, upstream_model: &str, original: Bytes) -> Bytes {
        match self {
            Self::Object(mut map) => {
                map.insert("model".to_string(), Value::String(upstream_model.to_string()));
                match serde_json::to_vec(&map) {
                    Ok(bytes) => Bytes::from(bytes),
                    Err(e) => {
                        tracing::error!("Failed to serialize rewritten request body: {}", e);
                        original
                    }
                }
            }
            Self::Opaque => original,
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Resolve the provider for an inbound request and build the upstream call.
///
/// No I/O happens here. The inbound path is not reused: the target is always
/// `<apiBase>/chat/completions`, with the inbound query string carried over.
pub fn translate(
    snapshot: &Snapshot,
    method: Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<TranslatedRequest, TranslationError> {
    let inbound = InboundBody::parse(&body);
    let alias = inbound.model().to_string();

    if alias.is_empty() {
        return Err(TranslationError::NotFound(alias));
    }

    let entry = snapshot
        .lookup(&alias)
        .ok_or_else(|| TranslationError::NotFound(alias.clone()))?;

    let url = upstream_url(entry, uri)?;
    let body = inbound.into_upstream_bytes(&entry.upstream_model, body);
    let headers = upstream_headers(entry, &url, headers, body.len())?;

    tracing::debug!(
        alias = %alias,
        upstream_model = %entry.upstream_model,
        inbound_path = %uri.path(),
        upstream = %url,
        "Translated chat request"
    );

    Ok(TranslatedRequest {
        alias,
        upstream_model: entry.upstream_model.clone(),
        method,
        url,
        headers,
        body,
    })
}

fn misconfigured(entry: &ProviderEntry, reason: impl Into<String>) -> TranslationError {
    let reason = reason.into();
    tracing::error!(alias = %entry.alias, "Invalid upstream configuration: {}", reason);
    TranslationError::Misconfigured {
        alias: entry.alias.clone(),
        reason,
    }
}

fn upstream_url(entry: &ProviderEntry, inbound: &Uri) -> Result<Url, TranslationError> {
    let base = entry.resolved_api_base().ok_or_else(|| {
        let kind = entry
            .provider_kind
            .as_ref()
            .map(|k| k.to_string())
            .unwrap_or_default();
        misconfigured(
            entry,
            format!("no apiBase provided and no mapping for provider '{kind}'"),
        )
    })?;

    let mut url =
        Url::parse(base).map_err(|e| misconfigured(entry, format!("invalid apiBase '{base}': {e}")))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(misconfigured(
            entry,
            format!("apiBase '{base}' is not an http(s) URL"),
        ));
    }

    let path = format!("{}{}", url.path().trim_end_matches('/'), CHAT_COMPLETIONS_PATH);
    url.set_path(&path);

    let query = match (url.query(), inbound.query()) {
        (Some(base_q), Some(inbound_q)) if !base_q.is_empty() && !inbound_q.is_empty() => {
            Some(format!("{base_q}&{inbound_q}"))
        }
        (Some(base_q), _) if !base_q.is_empty() => Some(base_q.to_string()),
        (_, Some(inbound_q)) if !inbound_q.is_empty() => Some(inbound_q.to_string()),
        _ => None,
    };
    url.set_query(query.as_deref());

    Ok(url)
}

fn upstream_headers(
    entry: &ProviderEntry,
    url: &Url,
    inbound: &HeaderMap,
    body_len: usize,
) -> Result<HeaderMap, TranslationError> {
    let mut headers = HeaderMap::with_capacity(inbound.len() + 3);
    for (name, value) in inbound.iter() {
        if should_forward_header(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    let auth = HeaderValue::from_str(&format!("Bearer {}", entry.api_key))
        .map_err(|_| misconfigured(entry, "apiKey contains characters not allowed in a header"))?;
    headers.insert(header::AUTHORIZATION, auth);

    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(misconfigured(entry, "apiBase has no host")),
    };
    let host = HeaderValue::from_str(&host)
        .map_err(|_| misconfigured(entry, "apiBase host is not a valid header value"))?;
    headers.insert(header::HOST, host);

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body_len));

    if !headers.contains_key(header::CONTENT_TYPE) {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }

    Ok(headers)
}
