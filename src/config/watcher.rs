// Config file watcher - reloads the provider registry on write

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::ConfigLoader;
use crate::error::ConfigError;
use crate::proxy::ProviderRegistry;

/// Editors often emit several events per save; wait this long for the burst to end.
const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Background task that re-runs [`ConfigLoader::reload_into`] whenever the
/// configuration file is written.
///
/// A failed reload is logged and the previous snapshot keeps serving; the
/// task keeps watching. Dropping the watcher or calling [`ConfigWatcher::stop`]
/// ends it.
pub struct ConfigWatcher {
    // Dropping this removes the OS watch.
    _watcher: RecommendedWatcher,
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ConfigWatcher {
    /// Start watching. Must be called inside a tokio runtime.
    pub fn spawn(loader: ConfigLoader, registry: Arc<ProviderRegistry>) -> Result<Self, ConfigError> {
        let path = loader.path().to_path_buf();
        let watch_err = |source| ConfigError::Watch {
            path: path.clone(),
            source,
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver gone means the task has stopped.
            let _ = event_tx.send(res);
        })
        .map_err(watch_err)?;

        // Watch the directory: rename-replace saves swap the file's inode,
        // which would end a watch placed on the file itself.
        let dir = watch_dir(&path);
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(watch_err)?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(watch_loop(loader, registry, event_rx, stop_rx));

        tracing::info!("Config watcher started for {:?}", path);
        Ok(Self {
            _watcher: watcher,
            stop_tx: Some(stop_tx),
            task,
        })
    }

    /// Stop the background task and wait for it to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!("Config watcher task ended abnormally: {}", e);
        }
        tracing::info!("Config watcher stopped");
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Whether `event` is a write to `target` (matched by file name, since the
/// watch is on the parent directory).
fn is_config_write(event: &Event, target: &Path) -> bool {
    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
        return false;
    }
    let Some(name) = target.file_name() else {
        return false;
    };
    event.paths.iter().any(|p| p.file_name() == Some(name))
}

async fn watch_loop(
    loader: ConfigLoader,
    registry: Arc<ProviderRegistry>,
    mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        let event = tokio::select! {
            _ = &mut stop => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            Ok(event) if is_config_write(&event, loader.path()) => {}
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!("Watcher error: {}", e);
                continue;
            }
        }

        // Coalesce the rest of the burst into this reload.
        tokio::time::sleep(SETTLE_DELAY).await;
        while events.try_recv().is_ok() {}

        let (loader, registry) = (loader.clone(), Arc::clone(&registry));
        let result = tokio::task::spawn_blocking(move || loader.reload_into(&registry)).await;
        match result {
            Ok(Ok((_, generation))) => {
                tracing::info!(generation, "Config reloaded successfully");
            }
            Ok(Err(e)) => {
                tracing::error!("Failed to reload config, keeping previous: {}", e);
            }
            Err(e) => {
                tracing::error!("Config reload task failed: {}", e);
            }
        }
    }
}
