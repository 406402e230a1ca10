//! Engine configuration
//!
//! Loaded from a JSON file in the platform config directory. Every field has a
//! default so a partial (or missing) file is fine.

use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants;
use crate::nodes::execution_engine::EngineExecutionMode;

/// Failure to read or parse a config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Tunables for the engine and the bundled group nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Whether triggers execute immediately or wait for `cook`
    pub execution_mode: EngineExecutionMode,
    /// Loop count a freshly created iteration node starts with
    pub default_iterations: usize,
    /// Requests above this are clamped
    pub max_iterations: usize,
    /// Minimum socket count for group boundary multi-sockets
    pub multi_socket_min: usize,
    /// Default `env_logger` filter; `RUST_LOG` wins when set
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            execution_mode: EngineExecutionMode::Auto,
            default_iterations: constants::group::DEFAULT_ITERATIONS,
            max_iterations: constants::group::MAX_ITERATIONS,
            multi_socket_min: constants::multi_socket::DEFAULT_MIN_SOCKETS,
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse a config from a JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Default location: `<config_dir>/nodeflow/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| {
            dir.join(constants::CONFIG_DIR_NAME)
                .join(constants::CONFIG_FILE_NAME)
        })
    }

    /// Load from the default location, falling back to defaults when there is no file
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => {
                debug!("No engine config file found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{ "default_iterations": 3 }"#).unwrap();
        assert_eq!(config.default_iterations, 3);
        assert_eq!(config.max_iterations, constants::group::MAX_ITERATIONS);
        assert_eq!(config.execution_mode, EngineExecutionMode::Auto);
    }

    #[test]
    fn execution_mode_is_lowercase() {
        let config = EngineConfig::from_json(r#"{ "execution_mode": "manual" }"#).unwrap();
        assert_eq!(config.execution_mode, EngineExecutionMode::Manual);
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "log_level": "debug", "max_iterations": 50 }}"#).unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.max_iterations, 50);
    }

    #[test]
    fn load_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = EngineConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = EngineConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
