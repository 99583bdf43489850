//! Change listeners and the ordered set holding the global ones.

use crate::core::ConfigProvider;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// A callback invoked with the provider after a reload pass.
///
/// Implemented for every `Fn(&ConfigProvider) + Send + Sync` closure, so most
/// callers never implement it by hand.
pub trait ConfigUpdateNotify: Send + Sync {
    /// Called after the configuration was refreshed.
    fn on_config_update(&self, provider: &ConfigProvider);
}

impl<F> ConfigUpdateNotify for F
where
    F: Fn(&ConfigProvider) + Send + Sync,
{
    fn on_config_update(&self, provider: &ConfigProvider) {
        self(provider)
    }
}

/// Shared handle to a listener.
pub type Notifier = Arc<dyn ConfigUpdateNotify>;

/// Wrap a closure into a [`Notifier`].
///
/// # Examples
///
/// ```rust
/// use livecfg::notify::notifier;
///
/// let listener = notifier(|provider| {
///     println!("timeout is now {:?}", provider.get_duration("timeout"));
/// });
/// # let _ = listener;
/// ```
pub fn notifier<F>(callback: F) -> Notifier
where
    F: Fn(&ConfigProvider) + Send + Sync + 'static,
{
    Arc::new(callback)
}

/// Append-only, ordered set of listeners.
///
/// Notification order is insertion order. Listeners are never removed.
pub struct ListenerSet {
    listeners: Mutex<Vec<Notifier>>,
}

impl ListenerSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Append listeners, keeping their order.
    pub fn extend<I>(&self, listeners: I)
    where
        I: IntoIterator<Item = Notifier>,
    {
        self.listeners.lock().extend(listeners);
    }

    /// Copy of the current listeners.
    ///
    /// Notifying from a snapshot keeps the lock free while callbacks run, so a
    /// callback may register further listeners; those fire from the next pass.
    pub fn snapshot(&self) -> Vec<Notifier> {
        self.listeners.lock().clone()
    }

    /// Call every listener in insertion order.
    pub fn notify_all(&self, provider: &ConfigProvider) {
        for listener in self.snapshot() {
            listener.on_config_update(provider);
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ListenerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet").field("len", &self.len()).finish()
    }
}
