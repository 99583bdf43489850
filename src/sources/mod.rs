//! Inputs feeding the typed store: the bound file, the environment and the
//! command line.

mod env;
mod file;
mod flags;

pub use env::EnvOverlay;
pub use file::{ConfigFile, ConfigFormat, write_settings};
pub use flags::{
    CONFIG_FILE_KEY, DUMP_CONFIG_KEY, ProviderArgs, default_app_name, default_config_file,
};
