// Upstream forwarding with streaming response relay

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName},
    response::Response,
};
use futures::TryStreamExt;
use reqwest::Client;
use std::time::Duration;

use crate::error::ForwardError;
use crate::proxy::TranslatedRequest;

/// Response headers that describe the upstream connection rather than the body.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// Header map for logs, with credentials masked.
pub(crate) fn redacted(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if name == header::AUTHORIZATION || name == header::PROXY_AUTHORIZATION {
                "<redacted>".to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            (name.as_str().to_string(), shown)
        })
        .collect()
}

/// Executes translated requests. One attempt per request, no retries.
#[derive(Debug, Clone)]
pub struct ProxyForwarder {
    client: Client,
}

impl ProxyForwarder {
    /// Without a connect timeout the transport defaults apply.
    pub fn new(connect_timeout: Option<Duration>) -> reqwest::Result<Self> {
        let mut builder = Client::builder().pool_max_idle_per_host(10);
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Send `request` and relay the upstream response as it arrives.
    ///
    /// Upstream error statuses are relayed as-is; only transport failures
    /// become a [`ForwardError`]. The body is never buffered, so dropping the
    /// returned response (client gone) also drops the upstream read.
    pub async fn forward(&self, request: TranslatedRequest) -> Result<Response, ForwardError> {
        let TranslatedRequest {
            alias,
            method,
            url,
            headers,
            body,
            ..
        } = request;

        tracing::debug!(
            alias = %alias,
            "Outgoing request: {} {} headers={:?} body={}",
            method,
            url,
            redacted(&headers),
            String::from_utf8_lossy(&body)
        );

        let upstream = self
            .client
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                let err = ForwardError::from(e);
                tracing::error!(alias = %alias, "Proxy error: {}", err);
                err
            })?;

        let status = upstream.status();
        tracing::debug!(
            alias = %alias,
            status = %status,
            "Upstream response headers={:?}",
            redacted(upstream.headers())
        );

        let mut response = Response::builder().status(status);
        if let Some(out) = response.headers_mut() {
            for (name, value) in upstream.headers() {
                if !is_hop_by_hop(name) {
                    out.append(name.clone(), value.clone());
                }
            }
        }

        let chunk_alias = alias.clone();
        let stream = upstream
            .bytes_stream()
            .inspect_ok(move |chunk| {
                tracing::debug!(
                    alias = %chunk_alias,
                    "Upstream chunk: {}",
                    String::from_utf8_lossy(chunk)
                );
            })
            .map_err(move |e| {
                tracing::error!(alias = %alias, "Upstream stream failed mid-response: {}", e);
                std::io::Error::other(e)
            });

        response
            .body(Body::from_stream(stream))
            .map_err(|e| ForwardError::Transport(e.to_string()))
    }
}
