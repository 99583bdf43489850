//! Builder for constructing ConfigProvider instances.

use crate::core::ConfigProvider;
use crate::sources::{
    CONFIG_FILE_KEY, DUMP_CONFIG_KEY, EnvOverlay, ProviderArgs, default_app_name,
    default_config_file,
};
use crate::store::TypedStore;
use config::Value;
use std::path::PathBuf;
use std::time::Duration;

/// How accessors and the initial refresh treat conversion failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CastPolicy {
    /// Cast failures are returned as errors, and refresh failures during
    /// `init` are aggregated into the error `init` returns.
    #[default]
    Strict,
    /// Cast failures yield the type's zero value, and refresh failures during
    /// `init` are logged and discarded.
    Relaxed,
}

/// Settings fixed at build time.
#[derive(Debug, Clone)]
pub(crate) struct ProviderOptions {
    pub(crate) app_name: String,
    pub(crate) dump_dir: PathBuf,
    pub(crate) cast_policy: CastPolicy,
    pub(crate) file_watch: bool,
    pub(crate) watch_debounce: Duration,
}

/// Builder for constructing a [`ConfigProvider`].
///
/// # Examples
///
/// ```rust,no_run
/// use livecfg::prelude::*;
///
/// # fn example() -> Result<()> {
/// let provider = ConfigProvider::builder()
///     .with_app_name("gateway")
///     .with_config_file("conf/gateway.toml")
///     .with_env_prefix("GATEWAY")
///     .build();
///
/// provider.init(&StopFlag::new())?;
/// # Ok(())
/// # }
/// ```
pub struct ConfigProviderBuilder {
    app_name: Option<String>,
    config_file: Option<PathBuf>,
    dump_config: bool,
    dump_dir: PathBuf,
    overrides: Vec<(String, Value)>,
    env: EnvOverlay,
    cast_policy: CastPolicy,
    file_watch: bool,
    watch_debounce: Duration,
}

impl ConfigProviderBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            app_name: None,
            config_file: None,
            dump_config: false,
            dump_dir: PathBuf::from("."),
            overrides: Vec::new(),
            env: EnvOverlay::automatic(),
            cast_policy: CastPolicy::default(),
            file_watch: cfg!(feature = "file-watch"),
            watch_debounce: Duration::from_millis(500),
        }
    }

    /// Name used for the default config path and the dump file.
    ///
    /// Defaults to the running binary's name.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Config file to bind, instead of `./conf/<app_name>.toml`.
    ///
    /// This is the command-line value of `config_file`: it wins over the
    /// `CONFIG_FILE` environment variable.
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Write the resolved configuration during `init` and ask the host to stop.
    pub fn with_dump_config(mut self, enabled: bool) -> Self {
        self.dump_config = enabled;
        self
    }

    /// Directory receiving the dump file. Defaults to the working directory.
    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = dir.into();
        self
    }

    /// Add a highest-precedence value for `key`.
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    /// Apply parsed command-line flags.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use clap::Parser;
    /// use livecfg::prelude::*;
    /// use livecfg::sources::ProviderArgs;
    ///
    /// #[derive(Parser)]
    /// struct Cli {
    ///     #[command(flatten)]
    ///     config: ProviderArgs,
    /// }
    ///
    /// let cli = Cli::parse_from(["gateway", "--set", "server.port=9090"]);
    /// let provider = ConfigProvider::builder()
    ///     .with_app_name("gateway")
    ///     .with_args(cli.config)
    ///     .build();
    /// assert_eq!(provider.get_uint16("server.port").unwrap(), 9090);
    /// ```
    pub fn with_args(mut self, args: ProviderArgs) -> Self {
        if args.dump_config {
            self.dump_config = true;
        }
        if let Some(path) = args.config_file {
            self.config_file = Some(path);
        }
        for (key, value) in args.overrides {
            self.overrides.push((key, Value::from(value)));
        }
        self
    }

    /// Replace the environment layer.
    pub fn with_env(mut self, env: EnvOverlay) -> Self {
        self.env = env;
        self
    }

    /// Only consult variables named `PREFIX_<KEY>`.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env = self.env.with_prefix(prefix);
        self
    }

    /// Do not consult environment variables at all.
    pub fn without_env(mut self) -> Self {
        self.env = EnvOverlay::disabled();
        self
    }

    /// Choose between strict and relaxed cast semantics.
    pub fn with_cast_policy(mut self, policy: CastPolicy) -> Self {
        self.cast_policy = policy;
        self
    }

    /// Enable or disable watching the config file after `init`.
    ///
    /// Watching is on by default when the `file-watch` feature is enabled and
    /// requires a running tokio runtime during `init`.
    pub fn with_file_watch(mut self, enabled: bool) -> Self {
        self.file_watch = enabled;
        self
    }

    /// Quiet period before a burst of file events triggers a reload.
    pub fn with_watch_debounce(mut self, debounce: Duration) -> Self {
        self.watch_debounce = debounce;
        self
    }

    /// Build the provider.
    ///
    /// Nothing is read yet: the store holds the command-line overrides and
    /// the provider's own defaults until [`init`](crate::core::Service::init)
    /// runs.
    pub fn build(self) -> ConfigProvider {
        let app_name = self.app_name.unwrap_or_else(default_app_name);

        let mut store = TypedStore::new(self.env);
        store.set_default(
            CONFIG_FILE_KEY,
            Value::from(default_config_file(&app_name).to_string_lossy().into_owned()),
        );
        store.set_default(DUMP_CONFIG_KEY, Value::from(false));

        if let Some(path) = self.config_file {
            store.set_override(CONFIG_FILE_KEY, Value::from(path.to_string_lossy().into_owned()));
        }
        if self.dump_config {
            store.set_override(DUMP_CONFIG_KEY, Value::from(true));
        }
        for (key, value) in self.overrides {
            store.set_override(&key, value);
        }

        ConfigProvider::from_parts(
            store,
            ProviderOptions {
                app_name,
                dump_dir: self.dump_dir,
                cast_policy: self.cast_policy,
                file_watch: self.file_watch,
                watch_debounce: self.watch_debounce,
            },
        )
    }
}

impl Default for ConfigProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
