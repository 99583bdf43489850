//! # livecfg
//!
//! Live-reloading configuration provider with typed accessors and ordered
//! change notifications.
//!
//! ## Overview
//!
//! `livecfg` resolves keys through a layered store and keeps registered
//! values in sync with a configuration file:
//! - Layered precedence: overrides → environment → file → defaults
//! - Typed accessors with Go-style durations, timestamps and slices
//! - Automatic reload when the file changes, with last-known-good fallback
//! - Ordered notifications: per-value listeners, then global listeners
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use livecfg::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> livecfg::error::Result<()> {
//! let provider = ConfigProvider::builder()
//!     .with_app_name("gateway")
//!     .build();
//!
//! let timeout = Arc::new(ConfigItem::new("timeout", Duration::from_secs(30), "request timeout"));
//! provider.register_config(timeout.clone(), [notifier(|p: &ConfigProvider| {
//!     println!("timeout is now {:?}", p.get_duration("timeout"));
//! })]);
//!
//! // Reads ./conf/gateway.toml and watches it for changes.
//! provider.init(&StopFlag::new())?;
//! println!("timeout: {:?}", timeout.get());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `file-watch` (default): reload on file changes, using `notify` and `tokio`
//! - `yaml`, `json`: dump the configuration in those formats
//!
//! ```toml
//! [dependencies]
//! livecfg = { version = "0.1", features = ["all-formats"] }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod notify;
pub mod sources;
pub mod store;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{
        CastPolicy, ConfigItem, ConfigProvider, ConfigProviderBuilder, ConfigValue,
        LifecycleState, ReloadReport, Service, StopFlag, Stopper,
    };
    pub use crate::error::{ConfigError, Result, ValidationError};
    pub use crate::notify::{ConfigUpdateNotify, Notifier, notifier};
}
