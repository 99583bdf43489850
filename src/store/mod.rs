//! The typed store and its casting rules.

mod cast;
mod typed_store;

pub use cast::{ConfigType, format_duration, parse_duration};
pub use typed_store::TypedStore;
