//! The bound configuration file.

use crate::error::{ConfigError, Result};
use config::{FileFormat, Map, Value, ValueKind};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`
    Toml,
    /// `.yaml` or `.yml`
    Yaml,
    /// `.json`
    Json,
}

impl ConfigFormat {
    /// Detect the format from a file extension (without the dot).
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    fn file_format(self) -> FileFormat {
        match self {
            Self::Toml => FileFormat::Toml,
            Self::Yaml => FileFormat::Yaml,
            Self::Json => FileFormat::Json,
        }
    }

    /// Serialize a settings tree in this format.
    ///
    /// TOML is always available; YAML and JSON require the `yaml` and `json`
    /// features.
    pub fn serialize(self, settings: &Map<String, Value>) -> Result<String> {
        let table = to_toml_table(settings);
        match self {
            Self::Toml => toml::to_string_pretty(&table)
                .map_err(|e| ConfigError::WriteError(format!("Failed to encode TOML: {}", e))),
            #[cfg(feature = "yaml")]
            Self::Yaml => serde_yaml::to_string(&table)
                .map_err(|e| ConfigError::WriteError(format!("Failed to encode YAML: {}", e))),
            #[cfg(not(feature = "yaml"))]
            Self::Yaml => Err(ConfigError::FeatureNotEnabled("yaml")),
            #[cfg(feature = "json")]
            Self::Json => serde_json::to_string_pretty(&table)
                .map_err(|e| ConfigError::WriteError(format!("Failed to encode JSON: {}", e))),
            #[cfg(not(feature = "json"))]
            Self::Json => Err(ConfigError::FeatureNotEnabled("json")),
        }
    }
}

/// The single configuration file a provider is bound to.
///
/// The file's extension selects the parser and its directory is the only
/// place searched; there is no fallback search path.
///
/// # Examples
///
/// ```rust
/// use livecfg::sources::{ConfigFile, ConfigFormat};
///
/// let file = ConfigFile::new("conf/server.toml").unwrap();
/// assert_eq!(file.name(), "server");
/// assert_eq!(file.format(), ConfigFormat::Toml);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    format: ConfigFormat,
}

impl ConfigFile {
    /// Bind to `path`, detecting the format from its extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is missing or unsupported.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                ConfigError::LoadError(format!(
                    "Unable to determine file format for: {}",
                    path.display()
                ))
            })?;

        let format = ConfigFormat::from_extension(extension).ok_or_else(|| {
            ConfigError::LoadError(format!(
                "Unsupported file extension: {}. Supported: .yaml, .yml, .toml, .json",
                extension
            ))
        })?;

        Ok(Self { path, format })
    }

    /// Full path of the bound file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name without the extension.
    pub fn name(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
    }

    /// Extension as written in the path, without the dot.
    pub fn extension(&self) -> &str {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
    }

    /// Directory holding the file.
    pub fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Detected format.
    pub fn format(&self) -> ConfigFormat {
        self.format
    }

    /// Read and parse the file into a settings tree with lower-cased keys.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::FileNotFound`] if the file does not exist
    /// - [`ConfigError::LoadError`] if it cannot be read
    /// - [`ConfigError::ParseError`] if its contents are invalid
    pub fn read(&self) -> Result<Map<String, Value>> {
        let contents = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::FileNotFound(self.path.clone()),
            _ => ConfigError::LoadError(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            )),
        })?;

        let parsed = config::Config::builder()
            .add_source(config::File::from_str(&contents, self.format.file_format()))
            .build()
            .map_err(|e| {
                ConfigError::ParseError(format!("{}: {}", self.path.display(), e))
            })?;

        let map = parsed
            .try_deserialize::<Map<String, Value>>()
            .map_err(|e| {
                ConfigError::ParseError(format!("{}: {}", self.path.display(), e))
            })?;

        Ok(lowercase_keys(map))
    }

    /// Path of the dump artifact for `app_name` inside `dir`:
    /// `dump_<app_name>.<ext>`.
    pub fn dump_path(&self, dir: &Path, app_name: &str) -> PathBuf {
        dir.join(format!("dump_{}.{}", app_name, self.extension()))
    }
}

/// Write `settings` to `path` in `format`.
pub fn write_settings(path: &Path, format: ConfigFormat, settings: &Map<String, Value>) -> Result<()> {
    let encoded = format.serialize(settings)?;
    fs::write(path, encoded).map_err(|e| {
        ConfigError::WriteError(format!("Failed to write {}: {}", path.display(), e))
    })
}

fn lowercase_keys(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| (key.to_lowercase(), lowercase_value(value)))
        .collect()
}

fn lowercase_value(value: Value) -> Value {
    match value.kind {
        ValueKind::Table(table) => Value::new(None, ValueKind::Table(lowercase_keys(table))),
        ValueKind::Array(items) => Value::new(
            None,
            ValueKind::Array(items.into_iter().map(lowercase_value).collect()),
        ),
        other => Value::new(None, other),
    }
}

fn to_toml_table(settings: &Map<String, Value>) -> toml::Table {
    settings
        .iter()
        .filter_map(|(key, value)| to_toml(value).map(|v| (key.clone(), v)))
        .collect()
}

fn to_toml(value: &Value) -> Option<toml::Value> {
    let converted = match &value.kind {
        ValueKind::Nil => return None,
        ValueKind::Boolean(b) => toml::Value::Boolean(*b),
        ValueKind::I64(i) => toml::Value::Integer(*i),
        ValueKind::I128(i) => i64::try_from(*i)
            .map(toml::Value::Integer)
            .unwrap_or_else(|_| toml::Value::String(i.to_string())),
        ValueKind::U64(u) => i64::try_from(*u)
            .map(toml::Value::Integer)
            .unwrap_or_else(|_| toml::Value::String(u.to_string())),
        ValueKind::U128(u) => i64::try_from(*u)
            .map(toml::Value::Integer)
            .unwrap_or_else(|_| toml::Value::String(u.to_string())),
        ValueKind::Float(f) => toml::Value::Float(*f),
        ValueKind::String(s) => toml::Value::String(s.clone()),
        ValueKind::Table(table) => toml::Value::Table(to_toml_table(table)),
        ValueKind::Array(items) => toml::Value::Array(items.iter().filter_map(to_toml).collect()),
    };
    Some(converted)
}
