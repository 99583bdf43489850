//! Layered key-value store with dotted-path lookups.

use crate::error::{ConfigError, Result};
use crate::sources::{ConfigFile, EnvOverlay, write_settings};
use config::{Map, Value, ValueKind};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// Single source of truth for resolved configuration values.
///
/// Lookups walk the layers from highest to lowest precedence:
/// overrides, environment, file contents, defaults. Keys are dotted paths
/// into nested tables and are case-insensitive.
#[derive(Debug)]
pub struct TypedStore {
    overrides: Map<String, Value>,
    file_values: Map<String, Value>,
    defaults: Map<String, Value>,
    env: EnvOverlay,
    file: Option<ConfigFile>,
}

impl TypedStore {
    /// Create an empty store using `env` as its environment layer.
    pub fn new(env: EnvOverlay) -> Self {
        Self {
            overrides: Map::new(),
            file_values: Map::new(),
            defaults: Map::new(),
            env,
            file: None,
        }
    }

    /// Register a fallback value for `key`.
    pub fn set_default(&mut self, key: &str, value: Value) {
        insert_path(&mut self.defaults, key, value);
    }

    /// Set a value that wins over every other layer.
    pub fn set_override(&mut self, key: &str, value: Value) {
        insert_path(&mut self.overrides, key, value);
    }

    /// Resolve `key` through the precedence chain.
    pub fn get(&self, key: &str) -> Option<Value> {
        let key = key.to_lowercase();
        if let Some(value) = lookup_path(&self.overrides, &key) {
            return Some(value.clone());
        }
        if let Some(value) = self.env.lookup(&key) {
            return Some(value);
        }
        lookup_path(&self.file_values, &key)
            .or_else(|| lookup_path(&self.defaults, &key))
            .cloned()
    }

    /// Whether any layer resolves `key`.
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Bind the store to its configuration file.
    pub fn bind_file(&mut self, file: ConfigFile) {
        self.file = Some(file);
    }

    /// The bound file, if any.
    pub fn config_file(&self) -> Option<&ConfigFile> {
        self.file.as_ref()
    }

    /// Read the bound file into the file layer.
    ///
    /// The previous file contents are kept when reading fails, so a broken
    /// edit leaves the last-known-good values in place.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileNotFound`] when the file is absent, and a
    /// load or parse error for anything else.
    pub fn read_in_config(&mut self) -> Result<()> {
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| ConfigError::LoadError("No configuration file bound".to_string()))?;
        let values = file.read()?;
        debug!(path = %file.path().display(), keys = values.len(), "configuration file read");
        self.file_values = values;
        Ok(())
    }

    /// Every known key resolved through the full precedence chain, as a
    /// nested tree.
    pub fn all_settings(&self) -> Map<String, Value> {
        let mut keys = BTreeSet::new();
        for layer in [&self.defaults, &self.file_values, &self.overrides] {
            collect_leaf_keys(layer, "", &mut keys);
        }

        let mut settings = Map::new();
        for key in keys {
            if let Some(value) = self.get(&key) {
                insert_path(&mut settings, &key, value);
            }
        }
        settings
    }

    /// The merged subtree under `key`, or the whole tree for an empty key.
    ///
    /// Unlike [`get`](Self::get), which returns the winning layer's value as
    /// is, a table here combines the leaves of every layer.
    pub fn settings_at(&self, key: &str) -> Option<Value> {
        let settings = self.all_settings();
        if key.is_empty() {
            return Some(Value::new(None, ValueKind::Table(settings)));
        }
        lookup_path(&settings, &key.to_lowercase()).cloned()
    }

    /// Write [`all_settings`](Self::all_settings) to `path` in the bound
    /// file's format.
    pub fn write_config_as(&self, path: &Path) -> Result<()> {
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| ConfigError::WriteError("No configuration file bound".to_string()))?;
        write_settings(path, file.format(), &self.all_settings())
    }
}

fn lookup_path<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let mut segments = key.split('.');
    let mut current = map.get(segments.next()?)?;
    for segment in segments {
        match &current.kind {
            ValueKind::Table(table) => current = table.get(segment)?,
            _ => return None,
        }
    }
    match current.kind {
        ValueKind::Nil => None,
        _ => Some(current),
    }
}

fn insert_path(map: &mut Map<String, Value>, key: &str, value: Value) {
    let key = key.to_lowercase();
    let mut segments: Vec<&str> = key.split('.').collect();
    let Some(last) = segments.pop() else {
        return;
    };

    let mut current = map;
    for segment in segments {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::new(None, ValueKind::Table(Map::new())));
        if !matches!(entry.kind, ValueKind::Table(_)) {
            *entry = Value::new(None, ValueKind::Table(Map::new()));
        }
        let ValueKind::Table(table) = &mut entry.kind else {
            unreachable!("entry was just made a table");
        };
        current = table;
    }
    current.insert(last.to_string(), value);
}

fn collect_leaf_keys(map: &Map<String, Value>, prefix: &str, keys: &mut BTreeSet<String>) {
    for (name, value) in map {
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        match &value.kind {
            ValueKind::Table(table) if !table.is_empty() => collect_leaf_keys(table, &key, keys),
            _ => {
                keys.insert(key);
            }
        }
    }
}
