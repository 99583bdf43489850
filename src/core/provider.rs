//! The configuration provider handle.

use crate::core::builder::{CastPolicy, ConfigProviderBuilder, ProviderOptions};
use crate::core::lifecycle::LifecycleState;
use crate::core::registry::{ConfigValue, ValueSet};
use crate::core::reload::ReloadReport;
use crate::error::{ConfigError, Result};
use crate::notify::{ListenerSet, Notifier};
use crate::store::{ConfigType, TypedStore};
use chrono::{DateTime, Utc};
use config::{Map, Value};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[cfg(feature = "file-watch")]
use crate::notify::ConfigWatcher;

pub(crate) struct ProviderInner {
    pub(crate) options: ProviderOptions,
    pub(crate) store: RwLock<TypedStore>,
    pub(crate) values: ValueSet,
    pub(crate) listeners: ListenerSet,
    pub(crate) state: Mutex<LifecycleState>,
    /// Serializes refresh passes, including the one `init` runs.
    pub(crate) reload_lock: Mutex<()>,
    pub(crate) last_reload: Mutex<Option<ReloadReport>>,
    #[cfg(feature = "file-watch")]
    pub(crate) watcher: Mutex<Option<ConfigWatcher>>,
}

/// Live-reloading configuration provider.
///
/// Holds the typed store, the registered config values and the global change
/// listeners. The handle is cheap to clone and every clone refers to the same
/// provider, so it can be handed to each subsystem that needs configuration.
///
/// # Examples
///
/// ```rust
/// use livecfg::prelude::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn example() -> Result<()> {
/// let provider = ConfigProvider::builder()
///     .with_app_name("example")
///     .with_config_file("/nonexistent/example.toml")
///     .build();
///
/// let timeout = Arc::new(ConfigItem::new("timeout", Duration::from_secs(30), "request timeout"));
/// provider.register_config(timeout.clone(), [notifier(|p| {
///     println!("timeout changed to {:?}", p.get_duration("timeout"));
/// })]);
///
/// provider.init(&StopFlag::new())?;
/// assert_eq!(*timeout.get(), Duration::from_secs(30));
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
#[derive(Clone)]
pub struct ConfigProvider {
    pub(crate) inner: Arc<ProviderInner>,
}

impl ConfigProvider {
    /// Create a new builder for constructing a provider.
    pub fn builder() -> ConfigProviderBuilder {
        ConfigProviderBuilder::new()
    }

    pub(crate) fn from_parts(store: TypedStore, options: ProviderOptions) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                options,
                store: RwLock::new(store),
                values: ValueSet::default(),
                listeners: ListenerSet::new(),
                state: Mutex::new(LifecycleState::Uninitialized),
                reload_lock: Mutex::new(()),
                last_reload: Mutex::new(None),
                #[cfg(feature = "file-watch")]
                watcher: Mutex::new(None),
            }),
        }
    }

    /// Register a config value together with the listeners scoped to it.
    ///
    /// Values registered before `init` get their defaults and first refresh
    /// during `init`; values registered later get both on the next reload.
    pub fn register_config<I>(&self, value: Arc<dyn ConfigValue>, listeners: I)
    where
        I: IntoIterator<Item = Notifier>,
    {
        self.inner.values.push(value, listeners.into_iter().collect());
    }

    /// Register listeners that fire after every reload pass.
    pub fn watch_config_update<I>(&self, listeners: I)
    where
        I: IntoIterator<Item = Notifier>,
    {
        self.inner.listeners.extend(listeners);
    }

    /// Register a fallback value for `key`.
    ///
    /// `doc` describes the key for readers of the registering code; the file
    /// backend does not keep it.
    pub fn set_default(&self, key: &str, _doc: &str, value: impl Into<Value>) {
        self.inner.store.write().set_default(key, value.into());
    }

    /// Set a value that wins over the environment, the file and defaults.
    pub fn set_override(&self, key: &str, value: impl Into<Value>) {
        self.inner.store.write().set_override(key, value.into());
    }

    /// Resolve `key` and convert it to `T`.
    ///
    /// A missing scalar key yields `T::default()`. Under
    /// [`CastPolicy::Strict`] a value that fails to convert is an error, as
    /// is a missing duration, time or slice key. Under [`CastPolicy::Relaxed`]
    /// both yield `T::default()`.
    pub fn get<T: ConfigType>(&self, key: &str) -> Result<T> {
        let raw = self.inner.store.read().get(key);
        let cast = match raw {
            Some(raw) => T::cast(&raw),
            None => T::cast_missing(),
        };

        match cast {
            Ok(value) => Ok(value),
            Err(reason) => match self.inner.options.cast_policy {
                CastPolicy::Strict => Err(ConfigError::CastError {
                    key: key.to_string(),
                    target: T::TYPE_NAME,
                    reason,
                }),
                CastPolicy::Relaxed => {
                    debug!(key, target = T::TYPE_NAME, %reason, "cast failed, using zero value");
                    Ok(T::default())
                }
            },
        }
    }

    /// Read `key` as a string.
    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    /// Read `key` as a bool.
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
    }

    /// Read `key` as a platform-width signed integer.
    pub fn get_int(&self, key: &str) -> Result<isize> {
        self.get(key)
    }

    /// Read `key` as an `i32`.
    pub fn get_int32(&self, key: &str) -> Result<i32> {
        self.get(key)
    }

    /// Read `key` as an `i64`.
    pub fn get_int64(&self, key: &str) -> Result<i64> {
        self.get(key)
    }

    /// Read `key` as a platform-width unsigned integer.
    pub fn get_uint(&self, key: &str) -> Result<usize> {
        self.get(key)
    }

    /// Read `key` as a `u16`.
    pub fn get_uint16(&self, key: &str) -> Result<u16> {
        self.get(key)
    }

    /// Read `key` as a `u32`.
    pub fn get_uint32(&self, key: &str) -> Result<u32> {
        self.get(key)
    }

    /// Read `key` as a `u64`.
    pub fn get_uint64(&self, key: &str) -> Result<u64> {
        self.get(key)
    }

    /// Read `key` as an `f64`.
    pub fn get_float64(&self, key: &str) -> Result<f64> {
        self.get(key)
    }

    /// Read `key` as a UTC timestamp.
    pub fn get_time(&self, key: &str) -> Result<DateTime<Utc>> {
        self.get(key)
    }

    /// Read `key` as a duration (`"1m30s"`, `"250ms"`; bare integers are
    /// nanoseconds).
    pub fn get_duration(&self, key: &str) -> Result<Duration> {
        self.get(key)
    }

    /// Read `key` as a list of integers.
    pub fn get_int_slice(&self, key: &str) -> Result<Vec<i64>> {
        self.get(key)
    }

    /// Read `key` as a list of strings.
    pub fn get_string_slice(&self, key: &str) -> Result<Vec<String>> {
        self.get(key)
    }

    /// Deserialize the merged subtree under `key` into `T`.
    ///
    /// Leaves come from every layer, so a struct can mix file values with
    /// defaults and environment overrides. An empty key deserializes the
    /// whole configuration.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use livecfg::prelude::*;
    /// use serde::Deserialize;
    ///
    /// #[derive(Debug, Deserialize)]
    /// struct Database {
    ///     host: String,
    ///     pool: u32,
    /// }
    ///
    /// let provider = ConfigProvider::builder().with_app_name("db").without_env().build();
    /// provider.set_default("database.host", "database host", "localhost");
    /// provider.set_default("database.pool", "pool size", 4i64);
    /// provider.set_override("database.pool", 16i64);
    ///
    /// let db: Database = provider.unmarshal_key("database").unwrap();
    /// assert_eq!(db.host, "localhost");
    /// assert_eq!(db.pool, 16);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a cast error if `key` is not set or the subtree does not match
    /// `T`, regardless of the cast policy.
    pub fn unmarshal_key<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let target = std::any::type_name::<T>();
        let cast_error = |reason: String| ConfigError::CastError {
            key: key.to_string(),
            target,
            reason,
        };

        let subtree = self.inner.store.read().settings_at(key);
        let subtree = subtree.ok_or_else(|| cast_error("key is not set".to_string()))?;
        subtree
            .try_deserialize()
            .map_err(|e| cast_error(e.to_string()))
    }

    /// Whether any layer resolves `key`.
    pub fn is_set(&self, key: &str) -> bool {
        self.inner.store.read().is_set(key)
    }

    /// Every known key resolved through the full precedence chain.
    pub fn all_settings(&self) -> Map<String, Value> {
        self.inner.store.read().all_settings()
    }

    /// Path of the bound config file, once `init` has resolved it.
    pub fn config_file(&self) -> Option<PathBuf> {
        self.inner
            .store
            .read()
            .config_file()
            .map(|file| file.path().to_path_buf())
    }

    /// Application name used for the default config path and dump file.
    pub fn app_name(&self) -> &str {
        &self.inner.options.app_name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.inner.state.lock()
    }

    /// Whether the bound file is being watched for changes.
    pub fn is_watching(&self) -> bool {
        #[cfg(feature = "file-watch")]
        {
            self.inner.watcher.lock().is_some()
        }
        #[cfg(not(feature = "file-watch"))]
        {
            false
        }
    }

    /// Number of registered config values.
    pub fn value_count(&self) -> usize {
        self.inner.values.len()
    }

    /// Number of global listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

impl std::fmt::Debug for ConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigProvider")
            .field("app_name", &self.inner.options.app_name)
            .field("state", &self.state())
            .field("values", &self.value_count())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
