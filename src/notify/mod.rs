//! Configuration change notification.
//!
//! Provides the listener capability, the ordered set of global listeners and,
//! with the `file-watch` feature, the file watcher that triggers reloads.

mod listener;

#[cfg(feature = "file-watch")]
mod watcher;

pub use listener::{ConfigUpdateNotify, ListenerSet, Notifier, notifier};

#[cfg(feature = "file-watch")]
pub use watcher::{ChangeCallback, ConfigWatcher};
