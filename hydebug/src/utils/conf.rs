use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    magic::{
        DEFAULT_CLOSED_HANDLES_QUEUE_MAX_SIZE, DEFAULT_PROTECTED_RAW_DATA_MAX_SIZE,
        ENV_DEBUG_CONFIG_PATH,
    },
    utils::error::{DebugError, DebugResult},
};

/// Limits of a debug session. Fixed once the session is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Number of closed handles kept in quarantine. Closing a handle while the quarantine is
    /// full frees the oldest closed handle.
    pub closed_handles_queue_max_size: usize,

    /// Cap on the cumulative size, in bytes, of the raw data kept protected after the owning
    /// handle was closed.
    pub protected_raw_data_max_size: usize,

    /// Optional cap on the number of simultaneously open handles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_open_handles: Option<usize>,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            closed_handles_queue_max_size: DEFAULT_CLOSED_HANDLES_QUEUE_MAX_SIZE,
            protected_raw_data_max_size: DEFAULT_PROTECTED_RAW_DATA_MAX_SIZE,
            max_open_handles: None,
        }
    }
}

impl DebugConfig {
    /// Get the default path to the debug configuration file.
    pub fn default_path() -> PathBuf {
        if let Ok(config_path) = std::env::var(ENV_DEBUG_CONFIG_PATH) {
            return config_path.into();
        }

        let mut path = PathBuf::new();

        #[cfg(target_os = "windows")]
        {
            if let Ok(appdata) = std::env::var("APPDATA") {
                path.push(appdata);
            }
        }
        #[cfg(not(target_os = "windows"))]
        {
            if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
                path.push(xdg_config_home);
            } else if let Ok(home) = std::env::var("HOME") {
                path.push(home);
                path.push(".config");
            }
        }

        path.push("hydebug");
        path.push("debug.toml");
        path
    }

    /// Load the configuration from a TOML file. Missing keys keep their default value.
    pub fn load_from_toml(path: &Path) -> DebugResult<Self> {
        let toml_str = std::fs::read_to_string(path)?;

        toml::from_str(&toml_str).map_err(|e| DebugError::ConfigParseError {
            source: e,
            file: path.display().to_string(),
        })
    }

    /// Load the configuration from [`DebugConfig::default_path`], falling back to the
    /// defaults when the file does not exist.
    pub fn load_or_default() -> DebugResult<Self> {
        let path = Self::default_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_toml(&path)
    }

    /// Save the configuration to a TOML file, creating parent directories as needed.
    pub fn save_to_toml(&self, path: &Path) -> DebugResult<()> {
        let toml_str = toml::to_string(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, toml_str)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("hydebug-conf-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn defaults_match_documented_limits() {
        let config = DebugConfig::default();
        assert_eq!(config.closed_handles_queue_max_size, 1024);
        assert_eq!(config.protected_raw_data_max_size, 10 * 1024 * 1024);
        assert_eq!(config.max_open_handles, None);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: DebugConfig = toml::from_str("closed_handles_queue_max_size = 4\n").unwrap();
        assert_eq!(config.closed_handles_queue_max_size, 4);
        assert_eq!(
            config.protected_raw_data_max_size,
            DEFAULT_PROTECTED_RAW_DATA_MAX_SIZE
        );
    }

    #[test]
    fn save_then_load() {
        let path = scratch_path("debug.toml");
        let config = DebugConfig {
            closed_handles_queue_max_size: 8,
            protected_raw_data_max_size: 100,
            max_open_handles: Some(64),
        };
        config.save_to_toml(&path).unwrap();
        assert_eq!(DebugConfig::load_from_toml(&path).unwrap(), config);
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn malformed_file_reports_path() {
        let path = scratch_path("broken.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "closed_handles_queue_max_size = \"many\"").unwrap();

        match DebugConfig::load_from_toml(&path) {
            Err(DebugError::ConfigParseError { file, .. }) => {
                assert_eq!(file, path.display().to_string())
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = scratch_path("absent.toml");
        assert!(matches!(
            DebugConfig::load_from_toml(&path),
            Err(DebugError::IoError(_))
        ));
    }
}
