// Ollama relay - local Ollama-compatible API in front of OpenAI-compatible providers

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod proxy;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::{AppState, ProxyForwarder};
use cli::Cli;
use config::{ConfigLoader, ConfigWatcher};
use proxy::ProviderRegistry;

/// Install the global subscriber. `RUST_LOG` wins over the `--debug` flag.
pub fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}

pub async fn run(cli: Cli) -> Result<()> {
    let loader = ConfigLoader::new(config::expand_home(&cli.config));
    loader.ensure_exists()?;

    // First load is fatal on error; later reloads only log.
    let registry = Arc::new(ProviderRegistry::new());
    let (file_config, _) = loader
        .reload_into(&registry)
        .context("failed to load initial config")?;

    let server = cli.server_config(file_config.server);
    let forwarder = ProxyForwarder::new(cli.connect_timeout.map(Duration::from_secs))
        .context("failed to build HTTP client")?;

    let watcher = ConfigWatcher::spawn(loader, Arc::clone(&registry))?;

    let listener = api::bind(&server).await?;
    let state = AppState::new(registry, forwarder);
    let result = api::serve(listener, state, shutdown_signal()).await;

    watcher.stop().await;
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down server...");
}
