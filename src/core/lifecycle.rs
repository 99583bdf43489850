//! Host lifecycle integration: the init/start/stop protocol.

use crate::core::ConfigProvider;
use crate::core::builder::CastPolicy;
use crate::error::{ConfigError, Result};
use crate::sources::{CONFIG_FILE_KEY, ConfigFile, DUMP_CONFIG_KEY};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

#[cfg(feature = "file-watch")]
use crate::notify::ConfigWatcher;

/// Where a provider is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Built, `init` not called yet.
    Uninitialized,
    /// `init` is running.
    Initializing,
    /// Initialized; reloads follow file changes if watching.
    Ready,
    /// The configuration was dumped and the host was asked to stop.
    DumpAndExit,
    /// `init` returned an error.
    Failed,
}

/// Lets a component ask its host to shut down.
pub trait Stopper: Send + Sync {
    /// Request shutdown.
    fn stop(&self);
}

/// A [`Stopper`] that records the request in a shared flag.
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    stopped: Arc<AtomicBool>,
}

impl StopFlag {
    /// Create an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether shutdown was requested.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl Stopper for StopFlag {
    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}

/// A long-lived component driven by its host.
pub trait Service {
    /// Prepare the component. Errors abort host startup.
    fn init(&self, stopper: &dyn Stopper) -> Result<()>;

    /// Begin serving.
    fn start(&self, stopper: &dyn Stopper) -> Result<()>;

    /// Request a graceful stop.
    fn stop(&self);

    /// Release resources after stopping.
    fn finish(&self);
}

impl Service for ConfigProvider {
    /// Bind the config file, apply defaults, read the file, arm the watch and
    /// run the first refresh.
    ///
    /// Listeners are not called here. In dump mode the resolved configuration
    /// is written to `dump_<app>.<ext>`, `stopper.stop()` is called and `init`
    /// returns success without reading the file.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::AlreadyInitialized`] on a second call
    /// - [`ConfigError::LoadError`] for an unsupported file extension or an
    ///   unreadable file, [`ConfigError::ParseError`] for invalid contents
    /// - [`ConfigError::WriteError`] if the dump cannot be written
    /// - [`ConfigError::WatchError`] if watching is enabled without a tokio
    ///   runtime
    /// - under [`CastPolicy::Strict`], the refresh errors of registered values
    fn init(&self, stopper: &dyn Stopper) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if *state != LifecycleState::Uninitialized {
                return Err(ConfigError::AlreadyInitialized);
            }
            *state = LifecycleState::Initializing;
        }

        let result = self.run_init(stopper);
        let state = match &result {
            Ok(state) => *state,
            Err(err) => {
                error!(error = %err, "configuration init failed");
                LifecycleState::Failed
            }
        };
        *self.inner.state.lock() = state;
        result.map(|_| ())
    }

    fn start(&self, _stopper: &dyn Stopper) -> Result<()> {
        debug!("config provider start");
        Ok(())
    }

    fn stop(&self) {
        debug!("config provider stop");
    }

    fn finish(&self) {
        debug!("config provider finish");
    }
}

impl ConfigProvider {
    fn run_init(&self, stopper: &dyn Stopper) -> Result<LifecycleState> {
        let path = self.get_string(CONFIG_FILE_KEY)?;
        info!(config_file = %path, "binding configuration file");
        let file = ConfigFile::new(&path)?;
        self.inner.store.write().bind_file(file.clone());

        for entry in self.inner.values.snapshot() {
            entry.ensure_defaults(self);
        }

        if self.get_bool(DUMP_CONFIG_KEY)? {
            let target = file.dump_path(&self.inner.options.dump_dir, self.app_name());
            self.inner.store.read().write_config_as(&target)?;
            info!(path = %target.display(), "configuration dumped");
            stopper.stop();
            return Ok(LifecycleState::DumpAndExit);
        }

        let _pass = self.inner.reload_lock.lock();

        let read = self.inner.store.write().read_in_config();
        match read {
            Ok(()) => self.arm_watch(&file)?,
            Err(err) if err.is_not_found() => {
                warn!(config_file = %path, "config file not found, using defaults");
            }
            Err(err) => return Err(err),
        }

        let failures = self.refresh_all();
        if !failures.is_empty() {
            match self.inner.options.cast_policy {
                CastPolicy::Strict => {
                    self.disarm_watch();
                    let errors = failures
                        .into_iter()
                        .map(|failure| {
                            Arc::try_unwrap(failure.error).unwrap_or_else(|shared| {
                                ConfigError::RefreshError(shared.to_string())
                            })
                        })
                        .collect();
                    if let Some(err) = ConfigError::combine(errors) {
                        return Err(err);
                    }
                }
                CastPolicy::Relaxed => {
                    warn!(failed = failures.len(), "ignoring refresh failures during init");
                }
            }
        }

        info!(values = self.value_count(), "configuration initialized");
        Ok(LifecycleState::Ready)
    }

    #[cfg(feature = "file-watch")]
    fn arm_watch(&self, file: &ConfigFile) -> Result<()> {
        if !self.inner.options.file_watch {
            return Ok(());
        }

        let provider = Arc::downgrade(&self.inner);
        let watcher = ConfigWatcher::watch(
            file.path(),
            self.inner.options.watch_debounce,
            Arc::new(move || {
                if let Some(inner) = provider.upgrade() {
                    ConfigProvider { inner }.reload();
                }
            }),
        )?;
        *self.inner.watcher.lock() = Some(watcher);
        Ok(())
    }

    #[cfg(not(feature = "file-watch"))]
    fn arm_watch(&self, _file: &ConfigFile) -> Result<()> {
        if self.inner.options.file_watch {
            return Err(ConfigError::FeatureNotEnabled("file-watch"));
        }
        Ok(())
    }

    fn disarm_watch(&self) {
        #[cfg(feature = "file-watch")]
        self.inner.watcher.lock().take();
    }
}
