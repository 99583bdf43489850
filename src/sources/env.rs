//! Environment variable overlay.

use config::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves dotted configuration keys from environment variables.
///
/// Lookups happen on demand, so a variable set after the provider was built
/// is still seen by the next read. The key is upper-cased and every `.` is
/// replaced by the key separator (`_` by default), so `server.max_conns`
/// resolves from `SERVER_MAX_CONNS`. Empty variables count as unset.
///
/// # Examples
///
/// ```rust
/// use livecfg::sources::EnvOverlay;
///
/// // APP_SERVER_PORT=8080 -> server.port = 8080
/// let overlay = EnvOverlay::automatic().with_prefix("APP");
/// assert_eq!(overlay.var_name("server.port"), "APP_SERVER_PORT");
/// ```
#[derive(Clone)]
pub struct EnvOverlay {
    prefix: Option<String>,
    separator: String,
    lookup: Option<Lookup>,
}

impl EnvOverlay {
    /// Overlay backed by the process environment.
    pub fn automatic() -> Self {
        Self {
            prefix: None,
            separator: "_".to_string(),
            lookup: Some(Arc::new(|name| std::env::var(name).ok())),
        }
    }

    /// Overlay backed by a fixed set of variables instead of the process
    /// environment.
    ///
    /// Useful for embedding and for tests that must not touch global state.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            prefix: None,
            separator: "_".to_string(),
            lookup: Some(Arc::new(move |name| vars.get(name).cloned())),
        }
    }

    /// Overlay that never resolves anything.
    pub fn disabled() -> Self {
        Self {
            prefix: None,
            separator: "_".to_string(),
            lookup: None,
        }
    }

    /// Require every variable to start with `PREFIX_`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = (!prefix.is_empty()).then(|| prefix.to_uppercase());
        self
    }

    /// Replace `.` with `separator` instead of `_` when building variable names.
    pub fn with_key_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Whether this overlay resolves anything at all.
    pub fn is_enabled(&self) -> bool {
        self.lookup.is_some()
    }

    /// The environment variable consulted for `key`.
    pub fn var_name(&self, key: &str) -> String {
        let name = key.replace('.', &self.separator).to_uppercase();
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, name),
            None => name,
        }
    }

    /// Look up `key`, returning its raw string value when set and non-empty.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        let lookup = self.lookup.as_ref()?;
        lookup(&self.var_name(key))
            .filter(|value| !value.is_empty())
            .map(Value::from)
    }
}

impl Default for EnvOverlay {
    fn default() -> Self {
        Self::automatic()
    }
}

impl fmt::Debug for EnvOverlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvOverlay")
            .field("prefix", &self.prefix)
            .field("separator", &self.separator)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
