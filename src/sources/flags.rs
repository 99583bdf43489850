//! Command-line flags owned by the provider.

use std::path::PathBuf;

/// Key holding the path of the bound config file.
pub const CONFIG_FILE_KEY: &str = "config_file";

/// Key holding the dump-and-exit switch.
pub const DUMP_CONFIG_KEY: &str = "dump_config";

/// Flags a host flattens into its own command line.
///
/// # Examples
///
/// ```rust
/// use clap::Parser;
/// use livecfg::sources::ProviderArgs;
///
/// #[derive(Parser)]
/// struct Cli {
///     #[command(flatten)]
///     config: ProviderArgs,
/// }
///
/// let cli = Cli::parse_from([
///     "server",
///     "--config_file",
///     "conf/prod.toml",
///     "--set",
///     "server.port=9090",
/// ]);
/// assert_eq!(cli.config.overrides, vec![("server.port".to_string(), "9090".to_string())]);
/// ```
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ProviderArgs {
    /// Write the fully resolved configuration to dump_<app>.<ext> and exit
    #[arg(long = "dump_config")]
    pub dump_config: bool,

    /// Application config file [default: ./conf/<binary-name>.toml]
    #[arg(long = "config_file", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Override a configuration key, e.g. --set server.port=9090
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub overrides: Vec<(String, String)>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in {:?}", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Name of the running binary, without a Windows `.exe` suffix.
pub fn default_app_name() -> String {
    let name = std::env::args_os()
        .next()
        .map(PathBuf::from)
        .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());

    if cfg!(windows) {
        name.strip_suffix(".exe").map(str::to_string).unwrap_or(name)
    } else {
        name
    }
}

/// Default config path for `app_name`: `./conf/<app_name>.toml`.
pub fn default_config_file(app_name: &str) -> PathBuf {
    PathBuf::from(format!("./conf/{}.toml", app_name))
}
