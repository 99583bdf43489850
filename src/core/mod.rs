//! Core configuration management types.

mod builder;
mod item;
mod lifecycle;
mod provider;
mod registry;
mod reload;

pub use builder::{CastPolicy, ConfigProviderBuilder};
pub use item::ConfigItem;
pub use lifecycle::{LifecycleState, Service, StopFlag, Stopper};
pub use provider::ConfigProvider;
pub use registry::ConfigValue;
pub use reload::{RefreshFailure, ReloadReport};
