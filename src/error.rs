// Error types for the relay

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to read or decode the configuration source.
///
/// Fatal on the first load, logged and skipped on a hot reload.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Empty or whitespace-only file. Rejected so a half-written save cannot clear the registry.
    #[error("config {} is empty", path.display())]
    Empty { path: PathBuf },

    #[error("failed to watch config {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Failure to turn an inbound request into an upstream request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslationError {
    /// No alias could be read from the body, or the alias is not configured.
    #[error("model '{0}' not found in proxy configuration")]
    NotFound(String),

    /// The entry exists but no usable upstream URL can be derived from it.
    #[error("invalid upstream configuration for model '{alias}': {reason}")]
    Misconfigured { alias: String, reason: String },
}

impl TranslationError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Misconfigured { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TranslationError {
    fn into_response(self) -> Response {
        let body = match &self {
            Self::NotFound(_) => json!({ "error": self.to_string() }),
            // Keep operator details in the log, not in the client response.
            Self::Misconfigured { .. } => json!({
                "error": "invalid upstream configuration - missing or invalid API base URL"
            }),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Failure while executing a translated request against the upstream.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("upstream request timed out: {0}")]
    Timeout(String),

    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    #[error("upstream request failed: {0}")]
    Transport(String),
}

impl ForwardError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Unreachable(_) | Self::Transport(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn details(&self) -> &str {
        match self {
            Self::Timeout(d) | Self::Unreachable(d) | Self::Transport(d) => d,
        }
    }
}

impl From<reqwest::Error> for ForwardError {
    fn from(err: reqwest::Error) -> Self {
        // A connect timeout is both a timeout and a connect error; report it as a timeout.
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Unreachable(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(json!({
                "error": "proxy error",
                "details": self.details(),
            })),
        )
            .into_response()
    }
}
