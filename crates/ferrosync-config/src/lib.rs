//! Configuration management system for ferrosync
//!
//! This crate provides two layers of configuration:
//!
//! - [`SyncConfig`]: the validated, immutable per-server settings consumed by
//!   the sync engine, built with [`SyncConfigBuilder`]
//! - [`ProjectConfig`]: a file-based description of one local tree mirrored to
//!   any number of servers, loaded from YAML, TOML or JSON with environment
//!   variable overrides
//!
//! # Examples
//!
//! ```rust,no_run
//! use ferrosync_config::{ConfigBuilder, SyncConfig};
//! use std::time::Duration;
//!
//! let project = ConfigBuilder::new()
//!     .add_source_file("ferrosync.yaml")
//!     .add_env_prefix("FERROSYNC")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! for server in project.sync_configs().expect("invalid server entry") {
//!     println!("{} as {}", server.address(), server.user);
//! }
//!
//! let single = SyncConfig::builder("192.168.1.12", "syncuser")
//!     .password("secret")
//!     .retries(3, Duration::from_secs(2))
//!     .build()
//!     .unwrap();
//! assert_eq!(single.port, 22);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use ferrosync_types::{RetryPolicy, TimeoutConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod builder;
pub mod error;
pub mod loader;
pub mod server;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use server::{
    Credential, SyncConfig, SyncConfigBuilder, Transport, DEFAULT_DOWNLOAD_THRESHOLD, DEFAULT_PORT,
};

/// File-based configuration: one local tree, many servers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Local directory to mirror
    #[serde(default)]
    pub local_dir: Option<PathBuf>,
    /// Remote directory receiving the mirror
    #[serde(default)]
    pub remote_dir: Option<String>,
    /// Delete remote files missing locally
    #[serde(default)]
    pub delete: bool,
    /// Largest remote file downloaded for fingerprinting
    pub download_threshold: u64,
    /// Follow symbolic links in the local tree
    pub follow_symlinks: bool,
    /// Connection retry settings
    pub retry: RetrySection,
    /// Timeout settings
    pub timeouts: TimeoutSection,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Servers synced one after another
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            local_dir: None,
            remote_dir: None,
            delete: false,
            download_threshold: DEFAULT_DOWNLOAD_THRESHOLD,
            follow_symlinks: false,
            retry: RetrySection::default(),
            timeouts: TimeoutSection::default(),
            logging: LoggingConfig::default(),
            servers: Vec::new(),
        }
    }
}

impl ProjectConfig {
    /// Convert every server entry into a validated [`SyncConfig`]
    pub fn sync_configs(&self) -> ConfigResult<Vec<SyncConfig>> {
        if self.servers.is_empty() {
            return Err(ConfigError::missing("servers"));
        }

        self.servers
            .iter()
            .map(|server| {
                let mut builder = SyncConfig::builder(&server.host, &server.user)
                    .port(server.port)
                    .retry_policy(self.retry.to_policy())
                    .timeouts(self.timeouts.to_config())
                    .download_threshold(self.download_threshold)
                    .follow_symlinks(self.follow_symlinks);

                if let Some(password) = &server.password {
                    builder = builder.password(password);
                }
                if let Some(key) = &server.private_key {
                    builder = builder.private_key(key);
                }
                if let Some(passphrase) = &server.passphrase {
                    builder = builder.passphrase(passphrase);
                }
                if let Some(root) = &server.mount_root {
                    builder = builder.mounted(root);
                }

                builder.build().map_err(|e| {
                    ConfigError::invalid(format!("servers[{}]", server.host), e.to_string())
                })
            })
            .collect()
    }
}

/// Retry settings as written in configuration files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    /// Retries after the first login attempt
    pub max_retries: u32,
    /// Seconds between attempts
    pub delay_secs: u64,
}

impl RetrySection {
    /// Convert to the engine's retry policy
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.delay_secs))
    }
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: RetryPolicy::DEFAULT_RETRIES,
            delay_secs: RetryPolicy::DEFAULT_DELAY.as_secs(),
        }
    }
}

/// Timeout settings as written in configuration files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSection {
    /// Seconds allowed for one connect-and-login attempt
    pub connect_secs: u64,
    /// Seconds allowed for each remote call
    pub idle_secs: u64,
}

impl TimeoutSection {
    /// Convert to the engine's timeout configuration
    pub fn to_config(&self) -> TimeoutConfig {
        TimeoutConfig {
            connect_timeout: Duration::from_secs(self.connect_secs),
            idle_timeout: Duration::from_secs(self.idle_secs),
        }
    }
}

impl Default for TimeoutSection {
    fn default() -> Self {
        let defaults = TimeoutConfig::default();
        Self {
            connect_secs: defaults.connect_timeout.as_secs(),
            idle_secs: defaults.idle_timeout.as_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Enable JSON formatting
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json_format: false,
        }
    }
}

/// One server entry in a configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEntry {
    /// Host name or address
    pub host: String,
    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login user
    pub user: String,
    /// Password credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Private key material
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    /// Passphrase for the private key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
    /// Sync into this local directory instead of over SFTP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_root: Option<PathBuf>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
