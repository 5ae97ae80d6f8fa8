//! Configuration loader utilities

use crate::{ConfigBuilder, ConfigError, ConfigResult, ProjectConfig};
use std::path::{Path, PathBuf};

/// Environment prefix for configuration overrides
pub const ENV_PREFIX: &str = "FERROSYNC";

/// Configuration loader with common loading patterns
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from default locations
    pub fn load_default() -> ConfigResult<ProjectConfig> {
        let mut builder = ConfigBuilder::new();

        if let Some(path) = Self::find_default_config() {
            builder = builder.add_source_file(path);
        }

        builder.add_env_prefix(ENV_PREFIX).build()
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<ProjectConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::File {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }

        ConfigBuilder::new()
            .add_source_file(path)
            .add_env_prefix(ENV_PREFIX)
            .build()
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(config: &ProjectConfig, path: P) -> ConfigResult<()> {
        let path = path.as_ref();
        let content = Self::render(config, path.extension().and_then(|ext| ext.to_str()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    /// Render configuration in the format named by `extension` (YAML by default)
    pub fn render(config: &ProjectConfig, extension: Option<&str>) -> ConfigResult<String> {
        match extension {
            Some("toml") => {
                toml::to_string_pretty(config).map_err(|e| ConfigError::Render {
                    format: "TOML",
                    message: e.to_string(),
                })
            }
            Some("json") => {
                serde_json::to_string_pretty(config).map_err(|e| ConfigError::Render {
                    format: "JSON",
                    message: e.to_string(),
                })
            }
            _ => serde_yaml::to_string(config).map_err(|e| ConfigError::Render {
                format: "YAML",
                message: e.to_string(),
            }),
        }
    }

    /// Generate a default configuration file
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> ConfigResult<()> {
        Self::save_to_file(&ProjectConfig::default(), path)
    }

    /// First existing default configuration file
    pub fn find_default_config() -> Option<PathBuf> {
        Self::get_default_config_paths()
            .into_iter()
            .find(|path| path.exists())
    }

    /// Get default configuration file paths in order of preference
    fn get_default_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        for name in ["ferrosync", ".ferrosync"] {
            for ext in ["yaml", "yml", "toml", "json"] {
                paths.push(PathBuf::from(format!("{}.{}", name, ext)));
            }
        }

        #[cfg(unix)]
        {
            paths.push(PathBuf::from("/etc/ferrosync/config.yaml"));
            paths.push(PathBuf::from("/etc/ferrosync/config.toml"));
        }

        paths
    }
}
