//! Errors raised while loading or validating sync settings

use ferrosync_types::Error as FerrosyncError;
use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration could not be turned into sync settings
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A config file could not be read or written
    #[error("cannot access config file {}: {source}", path.display())]
    File {
        /// The file that was being read or written
        path: PathBuf,
        /// What the filesystem reported
        source: std::io::Error,
    },

    /// A server has neither a password nor a private key
    #[error("server {host} has no credential; set a password or a private key")]
    NoCredential {
        /// Server the entry belongs to
        host: String,
    },

    /// A server sets both a password and a private key
    #[error("server {host} sets both a password and a private key; keep one")]
    AmbiguousCredential {
        /// Server the entry belongs to
        host: String,
    },

    /// A required field is absent or blank
    #[error("{field} must be set")]
    MissingField {
        /// Dotted name of the field
        field: String,
    },

    /// A field holds a value sync cannot work with
    #[error("{field} is invalid: {reason}")]
    InvalidField {
        /// Dotted name of the field
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// The layered sources could not be merged or parsed
    #[error("cannot load configuration: {message}")]
    Load {
        /// Parser or merge failure
        message: String,
    },

    /// Settings could not be written out in the requested format
    #[error("cannot render configuration as {format}: {message}")]
    Render {
        /// Target format name
        format: &'static str,
        /// Serializer failure
        message: String,
    },
}

impl From<config::ConfigError> for ConfigError {
    fn from(error: config::ConfigError) -> Self {
        Self::Load {
            message: error.to_string(),
        }
    }
}

impl From<ConfigError> for FerrosyncError {
    fn from(error: ConfigError) -> Self {
        FerrosyncError::config(error.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    /// A required field is absent
    pub fn missing<S: Into<String>>(field: S) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// A field holds an unusable value
    pub fn invalid<F: Into<String>, R: Into<String>>(field: F, reason: R) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
