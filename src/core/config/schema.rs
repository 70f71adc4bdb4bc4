//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$RIGWORK_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/rigwork/config.toml`
//! 3. `~/.rigwork/config.toml` (canonical write location)
//!
//! # Rig Config
//!
//! Located at `<rig>/.store/config.toml`.
//!
//! # Validation
//!
//! Config values are validated after parsing so a bad prefix or an
//! impossible id length is reported at load time, not at first create.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::ids::{MAX_ID_LENGTH, MIN_ID_LENGTH};

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// actor = "alice"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Name recorded as `created_by` on new issues
    pub actor: Option<String>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(actor) = &self.actor {
            if actor.trim().is_empty() {
                return Err(ConfigError::InvalidValue("actor cannot be empty".into()));
            }
        }
        Ok(())
    }
}

/// How new root identifiers are generated.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdMode {
    /// Uniform random suffix.
    #[default]
    Random,
    /// Content hash of title, description, creator and timestamp.
    Hash,
}

/// Rig configuration.
///
/// # Example
///
/// ```toml
/// prefix = "fe"
/// id_mode = "hash"
/// max_hierarchy_depth = 3
/// min_id_length = 4
/// max_collision_probability = 0.25
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RigConfig {
    /// Issue id prefix, with or without the trailing hyphen
    pub prefix: Option<String>,

    /// Id generation mode
    pub id_mode: Option<IdMode>,

    /// Maximum depth of hierarchical child ids
    pub max_hierarchy_depth: Option<usize>,

    /// Shortest suffix length to generate
    pub min_id_length: Option<usize>,

    /// Collision probability the adaptive length stays under
    pub max_collision_probability: Option<f64>,
}

impl RigConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(prefix) = &self.prefix {
            if prefix.trim_matches('-').is_empty() {
                return Err(ConfigError::InvalidValue(
                    "prefix cannot be empty".to_string(),
                ));
            }
            if prefix
                .chars()
                .any(|c| c == '.' || c == '/' || c == '\\' || c.is_whitespace())
            {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid prefix '{}': must not contain '.', path separators or whitespace",
                    prefix
                )));
            }
        }

        if let Some(depth) = self.max_hierarchy_depth {
            if depth == 0 {
                return Err(ConfigError::InvalidValue(
                    "max_hierarchy_depth must be at least 1".to_string(),
                ));
            }
        }

        if let Some(length) = self.min_id_length {
            if !(MIN_ID_LENGTH..=MAX_ID_LENGTH).contains(&length) {
                return Err(ConfigError::InvalidValue(format!(
                    "min_id_length {} must be between {} and {}",
                    length, MIN_ID_LENGTH, MAX_ID_LENGTH
                )));
            }
        }

        if let Some(p) = self.max_collision_probability {
            if !(p > 0.0 && p < 1.0) {
                return Err(ConfigError::InvalidValue(format!(
                    "max_collision_probability {} must be in (0, 1)",
                    p
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod global_config {
        use super::*;

        #[test]
        fn defaults() {
            let config = GlobalConfig::default();
            assert!(config.actor.is_none());
            assert!(config.validate().is_ok());
        }

        #[test]
        fn blank_actor_rejected() {
            let config = GlobalConfig {
                actor: Some("  ".to_string()),
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn roundtrip() {
            let config = GlobalConfig {
                actor: Some("alice".to_string()),
            };
            let toml = toml::to_string_pretty(&config).unwrap();
            let parsed: GlobalConfig = toml::from_str(&toml).unwrap();
            assert_eq!(config, parsed);
        }
    }

    mod rig_config {
        use super::*;

        #[test]
        fn defaults() {
            let config = RigConfig::default();
            assert!(config.prefix.is_none());
            assert!(config.id_mode.is_none());
            assert!(config.validate().is_ok());
        }

        #[test]
        fn valid_prefix() {
            for prefix in ["bd", "bd-", "gt-mol-"] {
                let config = RigConfig {
                    prefix: Some(prefix.to_string()),
                    ..Default::default()
                };
                assert!(config.validate().is_ok(), "{prefix}");
            }
        }

        #[test]
        fn invalid_prefix() {
            for prefix in ["", "-", "b.d", "b d", "a/b"] {
                let config = RigConfig {
                    prefix: Some(prefix.to_string()),
                    ..Default::default()
                };
                assert!(config.validate().is_err(), "{prefix}");
            }
        }

        #[test]
        fn zero_depth_rejected() {
            let config = RigConfig {
                max_hierarchy_depth: Some(0),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn id_length_bounds() {
            let config = RigConfig {
                min_id_length: Some(9),
                ..Default::default()
            };
            assert!(config.validate().is_err());

            let config = RigConfig {
                min_id_length: Some(4),
                ..Default::default()
            };
            assert!(config.validate().is_ok());
        }

        #[test]
        fn probability_bounds() {
            for p in [0.0, 1.0, -0.5, 2.0] {
                let config = RigConfig {
                    max_collision_probability: Some(p),
                    ..Default::default()
                };
                assert!(config.validate().is_err(), "{p}");
            }
        }

        #[test]
        fn roundtrip() {
            let config = RigConfig {
                prefix: Some("fe".to_string()),
                id_mode: Some(IdMode::Hash),
                max_hierarchy_depth: Some(4),
                min_id_length: Some(4),
                max_collision_probability: Some(0.1),
            };

            let toml = toml::to_string_pretty(&config).unwrap();
            let parsed: RigConfig = toml::from_str(&toml).unwrap();
            assert_eq!(config, parsed);
        }

        #[test]
        fn reject_unknown_fields() {
            let toml = r#"
                prefix = "bd"
                unknown_field = true
            "#;

            let result: Result<RigConfig, _> = toml::from_str(toml);
            assert!(result.is_err());
        }
    }
}
