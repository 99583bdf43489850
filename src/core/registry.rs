//! Registered config values and their scoped listeners.

use crate::core::ConfigProvider;
use crate::error::Result;
use crate::notify::Notifier;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A registrant that owns part of the configuration.
///
/// Implementors install their defaults into the provider's store and
/// re-derive their cached state from it on every refresh. A failing refresh
/// keeps whatever state the value had before; the provider logs the error and
/// skips the listeners scoped to this value for that pass.
///
/// [`ConfigItem`](crate::core::ConfigItem) covers the common single-key case.
///
/// # Examples
///
/// ```rust
/// use livecfg::prelude::*;
/// use parking_lot::RwLock;
/// use std::time::Duration;
///
/// struct HttpSettings {
///     timeouts: RwLock<(Duration, Duration)>,
/// }
///
/// impl ConfigValue for HttpSettings {
///     fn set_default_value(&self, provider: &ConfigProvider) {
///         provider.set_default("http.connect_timeout", "connect timeout", "5s");
///         provider.set_default("http.read_timeout", "read timeout", "30s");
///     }
///
///     fn refresh_value(&self, provider: &ConfigProvider) -> Result<()> {
///         let connect = provider.get_duration("http.connect_timeout")?;
///         let read = provider.get_duration("http.read_timeout")?;
///         *self.timeouts.write() = (connect, read);
///         Ok(())
///     }
/// }
/// ```
pub trait ConfigValue: Send + Sync {
    /// Install this value's default(s) into the store.
    fn set_default_value(&self, provider: &ConfigProvider);

    /// Recompute cached state by re-reading the store.
    fn refresh_value(&self, provider: &ConfigProvider) -> Result<()>;
}

/// One config value with the listeners scoped to it.
pub(crate) struct RegisteredValue {
    pub(crate) value: Arc<dyn ConfigValue>,
    pub(crate) listeners: Vec<Notifier>,
    defaults_applied: AtomicBool,
}

impl RegisteredValue {
    /// Install the value's defaults unless that already happened.
    pub(crate) fn ensure_defaults(&self, provider: &ConfigProvider) {
        if !self.defaults_applied.swap(true, Ordering::AcqRel) {
            self.value.set_default_value(provider);
        }
    }

    pub(crate) fn notify(&self, provider: &ConfigProvider) {
        for listener in &self.listeners {
            listener.on_config_update(provider);
        }
    }
}

/// Append-only sequence of registered values, in registration order.
#[derive(Default)]
pub(crate) struct ValueSet {
    entries: Mutex<Vec<Arc<RegisteredValue>>>,
}

impl ValueSet {
    pub(crate) fn push(&self, value: Arc<dyn ConfigValue>, listeners: Vec<Notifier>) {
        self.entries.lock().push(Arc::new(RegisteredValue {
            value,
            listeners,
            defaults_applied: AtomicBool::new(false),
        }));
    }

    /// Entries registered so far; iterating the copy keeps the lock free while
    /// values and listeners run.
    pub(crate) fn snapshot(&self) -> Vec<Arc<RegisteredValue>> {
        self.entries.lock().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::notifier;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingValue {
        defaults: AtomicUsize,
    }

    impl ConfigValue for CountingValue {
        fn set_default_value(&self, _provider: &ConfigProvider) {
            self.defaults.fetch_add(1, Ordering::SeqCst);
        }

        fn refresh_value(&self, _provider: &ConfigProvider) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_defaults_apply_once() {
        let provider = ConfigProvider::builder().with_app_name("registry-test").build();
        let value = Arc::new(CountingValue::default());

        let set = ValueSet::default();
        set.push(value.clone(), Vec::new());

        let entry = &set.snapshot()[0];
        entry.ensure_defaults(&provider);
        entry.ensure_defaults(&provider);
        assert_eq!(value.defaults.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_snapshot_keeps_registration_order() {
        let set = ValueSet::default();
        let first: Arc<dyn ConfigValue> = Arc::new(CountingValue::default());
        let second: Arc<dyn ConfigValue> = Arc::new(CountingValue::default());
        set.push(first.clone(), vec![notifier(|_| {})]);
        set.push(second.clone(), Vec::new());

        let entries = set.snapshot();
        assert_eq!(set.len(), 2);
        assert!(Arc::ptr_eq(&entries[0].value, &first));
        assert!(Arc::ptr_eq(&entries[1].value, &second));
        assert_eq!(entries[0].listeners.len(), 1);
    }
}
