//! Single-key config values with lock-free reads.

use crate::core::{ConfigProvider, ConfigValue};
use crate::error::{ConfigError, Result, ValidationError};
use crate::store::ConfigType;
use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;

/// Type alias for validator functions.
type Validator<T> = Arc<dyn Fn(&T) -> std::result::Result<(), ValidationError> + Send + Sync>;

/// A config value bound to one key.
///
/// The item installs its default under its key, and every refresh reads the
/// key back through the provider's typed accessors. Reads are lock-free:
/// [`get`](Self::get) returns the value swapped in by the last successful
/// refresh. A refresh that fails to cast or validate leaves the previous value
/// in place.
///
/// # Examples
///
/// ```rust
/// use livecfg::prelude::*;
/// use std::sync::Arc;
///
/// let workers = Arc::new(
///     ConfigItem::new("pool.workers", 4u32, "worker threads").with_validation(|n| {
///         if *n == 0 {
///             return Err(ValidationError::invalid_field("pool.workers", "must be > 0"));
///         }
///         Ok(())
///     }),
/// );
///
/// assert_eq!(*workers.get(), 4);
/// ```
pub struct ConfigItem<T> {
    key: String,
    doc: String,
    default: T,
    current: ArcSwap<T>,
    validator: Option<Validator<T>>,
}

impl<T: ConfigType> ConfigItem<T> {
    /// Create an item for `key` holding `default` until the first refresh.
    pub fn new(key: impl Into<String>, default: T, doc: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            doc: doc.into(),
            current: ArcSwap::from_pointee(default.clone()),
            default,
            validator: None,
        }
    }

    /// Reject values failing `validator`; the previous value is kept.
    pub fn with_validation<F>(mut self, validator: F) -> Self
    where
        F: Fn(&T) -> std::result::Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Current value.
    pub fn get(&self) -> Arc<T> {
        self.current.load_full()
    }

    /// The key this item reads.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Description given at construction.
    pub fn doc(&self) -> &str {
        &self.doc
    }

    /// Value installed as the key's default.
    pub fn default_value(&self) -> &T {
        &self.default
    }
}

impl<T: ConfigType> ConfigValue for ConfigItem<T> {
    fn set_default_value(&self, provider: &ConfigProvider) {
        provider.set_default(&self.key, &self.doc, self.default.to_value());
    }

    fn refresh_value(&self, provider: &ConfigProvider) -> Result<()> {
        let value: T = provider.get(&self.key)?;
        if let Some(validator) = &self.validator {
            validator(&value).map_err(|e| {
                ConfigError::ValidationError(format!("{}: {}", self.key, e))
            })?;
        }
        self.current.store(Arc::new(value));
        Ok(())
    }
}

impl<T: fmt::Debug> fmt::Debug for ConfigItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigItem")
            .field("key", &self.key)
            .field("current", &self.current.load())
            .field("validated", &self.validator.is_some())
            .finish()
    }
}
