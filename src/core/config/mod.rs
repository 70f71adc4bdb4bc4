//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! There are two configuration scopes:
//! - **Global**: User-level settings (who is acting)
//! - **Rig**: Per-rig settings (id prefix, id generation, hierarchy depth)
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Rig config file
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$RIGWORK_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/rigwork/config.toml`
//! 3. `~/.rigwork/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use rigwork::core::config::Config;
//! use rigwork::core::paths::StorePaths;
//!
//! let paths = StorePaths::for_rig("/path/to/rig");
//! let config = Config::load(Some(&paths)).unwrap();
//!
//! println!("Prefix: {}", config.prefix());
//! println!("Max depth: {}", config.max_hierarchy_depth());
//! ```

pub mod schema;

pub use schema::{GlobalConfig, IdMode, RigConfig};

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::core::hierarchy::{build_prefix, DEFAULT_MAX_DEPTH};
use crate::core::ids::{DEFAULT_MAX_COLLISION_PROBABILITY, MIN_ID_LENGTH};
use crate::core::paths::{write_atomic, StorePaths};

/// Prefix used when a rig does not configure one.
pub const DEFAULT_PREFIX: &str = "bd-";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Merged configuration from all sources.
///
/// Accessor methods apply precedence and defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Rig configuration (if a rig was given and has a config file)
    pub rig: Option<RigConfig>,
    /// Path to the global config file (if loaded)
    global_path: Option<PathBuf>,
    /// Path to the rig config file (if loaded)
    rig_path: Option<PathBuf>,
}

impl Config {
    /// Build a config directly from its parts, without touching disk.
    pub fn from_parts(global: GlobalConfig, rig: Option<RigConfig>) -> Self {
        Self {
            global,
            rig,
            global_path: None,
            rig_path: None,
        }
    }

    /// Load configuration from default locations.
    ///
    /// If `rig` is provided, also loads that rig's config.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or fail
    /// validation. Missing config files are not an error.
    pub fn load(rig: Option<&StorePaths>) -> Result<Self, ConfigError> {
        let (global, global_path) = Self::load_global()?;

        let (rig_config, rig_path) = match rig {
            Some(paths) => {
                let path = paths.config_path();
                if path.exists() {
                    (Some(read_toml::<RigConfig>(&path)?), Some(path))
                } else {
                    (None, None)
                }
            }
            None => (None, None),
        };

        global.validate()?;
        if let Some(ref r) = rig_config {
            r.validate()?;
        }

        Ok(Config {
            global,
            rig: rig_config,
            global_path,
            rig_path,
        })
    }

    /// Load global configuration from standard locations.
    fn load_global() -> Result<(GlobalConfig, Option<PathBuf>), ConfigError> {
        // 1. Check $RIGWORK_CONFIG
        if let Ok(path) = std::env::var("RIGWORK_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                let config = read_toml(&path)?;
                return Ok((config, Some(path)));
            }
        }

        // 2. Check $XDG_CONFIG_HOME/rigwork/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("rigwork/config.toml");
            if path.exists() {
                let config = read_toml(&path)?;
                return Ok((config, Some(path)));
            }
        }

        // 3. Check ~/.rigwork/config.toml
        if let Some(home) = dirs::home_dir() {
            let path = home.join(".rigwork/config.toml");
            if path.exists() {
                let config = read_toml(&path)?;
                return Ok((config, Some(path)));
            }
        }

        Ok((GlobalConfig::default(), None))
    }

    /// Get the canonical path for global config.
    ///
    /// Returns `~/.rigwork/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".rigwork/config.toml"))
    }

    /// Write global config atomically.
    pub fn write_global(config: &GlobalConfig) -> Result<PathBuf, ConfigError> {
        config.validate()?;
        let path = Self::global_config_path()?;
        write_toml_atomic(&path, config)?;
        Ok(path)
    }

    /// Write rig config atomically.
    pub fn write_rig(paths: &StorePaths, config: &RigConfig) -> Result<PathBuf, ConfigError> {
        config.validate()?;
        let path = paths.config_path();
        write_toml_atomic(&path, config)?;
        Ok(path)
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// The issue id prefix, normalized to end with exactly one hyphen.
    ///
    /// Defaults to `bd-`.
    pub fn prefix(&self) -> String {
        match self.rig.as_ref().and_then(|r| r.prefix.as_deref()) {
            Some(prefix) => build_prefix(prefix, ""),
            None => DEFAULT_PREFIX.to_string(),
        }
    }

    /// The id generation mode. Defaults to random.
    pub fn id_mode(&self) -> IdMode {
        self.rig
            .as_ref()
            .and_then(|r| r.id_mode)
            .unwrap_or_default()
    }

    /// Maximum hierarchy depth. Defaults to 3.
    pub fn max_hierarchy_depth(&self) -> usize {
        self.rig
            .as_ref()
            .and_then(|r| r.max_hierarchy_depth)
            .unwrap_or(DEFAULT_MAX_DEPTH)
    }

    /// Shortest generated suffix. Defaults to 3.
    pub fn min_id_length(&self) -> usize {
        self.rig
            .as_ref()
            .and_then(|r| r.min_id_length)
            .unwrap_or(MIN_ID_LENGTH)
    }

    /// Collision threshold for adaptive id length. Defaults to 0.25.
    pub fn max_collision_probability(&self) -> f64 {
        self.rig
            .as_ref()
            .and_then(|r| r.max_collision_probability)
            .unwrap_or(DEFAULT_MAX_COLLISION_PROBABILITY)
    }

    /// The acting user recorded on new issues. Empty if not configured.
    pub fn actor(&self) -> &str {
        self.global.actor.as_deref().unwrap_or("")
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded rig config file.
    pub fn rig_config_loaded_from(&self) -> Option<&Path> {
        self.rig_path.as_deref()
    }
}

/// Read and parse a TOML config file.
fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Serialize a config to TOML and write it atomically.
fn write_toml_atomic<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let contents =
        toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

    write_atomic(path, contents.as_bytes()).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rig(temp: &TempDir) -> StorePaths {
        let paths = StorePaths::for_rig(temp.path());
        paths.ensure_dirs().unwrap();
        paths
    }

    #[test]
    fn defaults_without_rig_config() {
        let config = Config::from_parts(GlobalConfig::default(), None);
        assert_eq!(config.prefix(), "bd-");
        assert_eq!(config.id_mode(), IdMode::Random);
        assert_eq!(config.max_hierarchy_depth(), 3);
        assert_eq!(config.min_id_length(), 3);
        assert_eq!(config.max_collision_probability(), 0.25);
        assert_eq!(config.actor(), "");
    }

    #[test]
    fn load_rig_config() {
        let temp = TempDir::new().unwrap();
        let paths = rig(&temp);
        fs::write(
            paths.config_path(),
            r#"
            prefix = "fe"
            id_mode = "hash"
            max_hierarchy_depth = 5
            "#,
        )
        .unwrap();

        let config = Config::load(Some(&paths)).unwrap();
        assert_eq!(config.prefix(), "fe-");
        assert_eq!(config.id_mode(), IdMode::Hash);
        assert_eq!(config.max_hierarchy_depth(), 5);
        assert_eq!(config.rig_config_loaded_from(), Some(paths.config_path().as_path()));
    }

    #[test]
    fn missing_rig_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let paths = rig(&temp);

        let config = Config::load(Some(&paths)).unwrap();
        assert!(config.rig.is_none());
        assert!(config.rig_config_loaded_from().is_none());
    }

    #[test]
    fn write_rig_config_atomic() {
        let temp = TempDir::new().unwrap();
        let paths = rig(&temp);

        let rig_config = RigConfig {
            prefix: Some("api".to_string()),
            ..Default::default()
        };
        let path = Config::write_rig(&paths, &rig_config).unwrap();
        assert!(path.exists());

        let loaded = Config::load(Some(&paths)).unwrap();
        assert_eq!(loaded.prefix(), "api-");
    }

    #[test]
    fn invalid_prefix_rejected() {
        let temp = TempDir::new().unwrap();
        let paths = rig(&temp);
        fs::write(paths.config_path(), "prefix = \"a.b\"").unwrap();

        assert!(matches!(
            Config::load(Some(&paths)),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn unknown_fields_rejected() {
        let temp = TempDir::new().unwrap();
        let paths = rig(&temp);
        fs::write(
            paths.config_path(),
            r#"
            prefix = "bd"
            unknown_field = true
            "#,
        )
        .unwrap();

        assert!(matches!(
            Config::load(Some(&paths)),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn rig_values_override_defaults() {
        let config = Config::from_parts(
            GlobalConfig {
                actor: Some("alice".to_string()),
            },
            Some(RigConfig {
                min_id_length: Some(5),
                ..Default::default()
            }),
        );

        assert_eq!(config.actor(), "alice");
        assert_eq!(config.min_id_length(), 5);
        assert_eq!(config.prefix(), "bd-");
    }
}
