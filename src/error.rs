//! Error types for livecfg.

use std::fmt;
use std::path::PathBuf;

/// Result type alias for livecfg operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when working with configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The bound configuration file does not exist.
    ///
    /// Tolerated during `init`: the provider continues with defaults and
    /// environment values.
    #[error("Configuration file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Failed to read configuration from its source.
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    /// Failed to parse the configuration file.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// A stored value could not be converted to the requested type.
    #[error("Unable to cast key '{key}' to {target}: {reason}")]
    CastError {
        /// The dotted key that was looked up
        key: String,
        /// Name of the requested type
        target: &'static str,
        /// Why the conversion failed
        reason: String,
    },

    /// A registered config value failed to refresh itself.
    #[error("Failed to refresh configuration value: {0}")]
    RefreshError(String),

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// File watching failed to initialize.
    #[error("File watching error: {0}")]
    WatchError(String),

    /// Failed to write the configuration dump.
    #[error("Failed to write configuration: {0}")]
    WriteError(String),

    /// Attempted to use a feature that is not enabled.
    #[error("Feature not enabled: {0}")]
    FeatureNotEnabled(&'static str),

    /// `init` was called on a provider that already left the uninitialized state.
    #[error("Configuration provider already initialized")]
    AlreadyInitialized,

    /// Several errors collected from one pass over the registered values.
    #[error("{}", MultipleDisplay(.0))]
    Multiple(Vec<ConfigError>),
}

impl ConfigError {
    /// Returns true for the missing-file case that `init` tolerates.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound(_))
    }

    /// Fold a list of errors into one: `None` when empty, the error itself
    /// when there is exactly one, `Multiple` otherwise.
    pub fn combine(mut errors: Vec<ConfigError>) -> Option<ConfigError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }
}

struct MultipleDisplay<'a>(&'a [ConfigError]);

impl fmt::Display for MultipleDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} configuration errors", self.0.len())?;
        for (i, err) in self.0.iter().enumerate() {
            write!(f, "; {}. {}", i + 1, err)?;
        }
        Ok(())
    }
}

/// Validation error raised by a config value's own checks.
#[derive(Debug)]
pub enum ValidationError {
    /// Custom validation error with a message.
    Custom(String),

    /// A specific field has an invalid value.
    InvalidField {
        /// The field name/path
        field: String,
        /// The reason why it's invalid
        reason: String,
    },

    /// Multiple validation errors occurred.
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Create a custom validation error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Create an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(msg) => write!(f, "{}", msg),
            Self::InvalidField { field, reason } => {
                write!(f, "Field '{}' is invalid: {}", field, reason)
            }
            Self::Multiple(errors) => {
                writeln!(f, "Multiple validation errors:")?;
                for (i, err) in errors.iter().enumerate() {
                    writeln!(f, "  {}. {}", i + 1, err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for ConfigError {
    fn from(err: ValidationError) -> Self {
        ConfigError::ValidationError(err.to_string())
    }
}
