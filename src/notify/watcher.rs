//! File watching that drives configuration reloads.

use crate::error::{ConfigError, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Callback invoked once per debounced change of the watched file.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Watches one configuration file and invokes a callback when it changes.
///
/// The parent directory is watched and events are filtered on the file name,
/// so editors that save by writing a temporary file and renaming it over the
/// original still trigger a reload. Bursts of events are coalesced: the
/// callback runs once the file has been quiet for the debounce window.
///
/// Callbacks run one at a time on tokio's blocking pool, so a slow callback
/// delays the next one but never overlaps it. Dropping the watcher stops
/// event delivery and ends the background task.
///
/// # Examples
///
/// ```rust,no_run
/// use livecfg::notify::ConfigWatcher;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> livecfg::error::Result<()> {
/// let watcher = ConfigWatcher::watch(
///     "conf/server.toml",
///     Duration::from_millis(500),
///     Arc::new(|| println!("config file changed")),
/// )?;
/// # drop(watcher);
/// # Ok(())
/// # }
/// ```
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
    debounce_duration: Duration,
}

impl ConfigWatcher {
    /// Start watching `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if no tokio runtime is running, if the path cannot be
    /// resolved, or if the underlying file watcher cannot be created.
    pub fn watch(
        path: impl AsRef<Path>,
        debounce_duration: Duration,
        on_change: ChangeCallback,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            ConfigError::WatchError("file watching requires a running tokio runtime".to_string())
        })?;

        let path = path
            .as_ref()
            .canonicalize()
            .map_err(|e| ConfigError::WatchError(format!("Failed to resolve path: {}", e)))?;
        let file_name: OsString = path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| {
                ConfigError::WatchError(format!("Not a file path: {}", path.display()))
            })?;
        let watch_dir = path.parent().unwrap_or(Path::new("/")).to_path_buf();

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<()>();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        return;
                    }
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().is_some_and(|n| n == file_name));
                    if ours {
                        let _ = event_tx.send(());
                    }
                }
                Err(e) => error!(error = %e, "file watcher error"),
            }
        })
        .map_err(|e| ConfigError::WatchError(format!("Failed to create file watcher: {}", e)))?;

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|e| {
                ConfigError::WatchError(format!("Failed to watch {}: {}", watch_dir.display(), e))
            })?;

        let debounce = debounce_duration;
        let watched = path.clone();
        runtime.spawn(async move {
            loop {
                if event_rx.recv().await.is_none() {
                    break;
                }

                // Wait until the file has been quiet for a full window.
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(debounce) => break,
                        msg = event_rx.recv() => {
                            if msg.is_none() {
                                return;
                            }
                        }
                    }
                }

                debug!(path = %watched.display(), "config file changed");
                let callback = Arc::clone(&on_change);
                if let Err(e) = tokio::task::spawn_blocking(move || callback()).await {
                    error!(path = %watched.display(), error = %e, "config change callback failed");
                }
            }
            debug!(path = %watched.display(), "config watcher stopped");
        });

        info!(path = %path.display(), "watching config file");

        Ok(Self {
            _watcher: watcher,
            path,
            debounce_duration,
        })
    }

    /// Canonical path of the watched file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the debounce duration for this watcher.
    pub fn debounce_duration(&self) -> Duration {
        self.debounce_duration
    }
}
