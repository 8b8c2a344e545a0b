//! Modem settings

use crate::core::client::DEFAULT_INIT_COMMANDS;
use crate::core::engine::EngineConfig;
use crate::core::logger::{transcript_filename, TranscriptFormat};
use crate::core::transport::SerialConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No platform config directory
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// Read or write failed
    #[error("Config file {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid TOML for [`ModemConfig`]
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be serialized
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Modem configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Serial port settings
    pub serial: SerialConfig,
    /// Run `stty` to set the port speed before opening it
    pub set_line_speed: bool,
    /// Per-command timeout in seconds; unset waits forever
    pub command_timeout_secs: Option<u64>,
    /// Longest accepted line in bytes; unset is unbounded
    pub max_line_len: Option<usize>,
    /// Commands sent on `init`
    pub init_commands: Vec<String>,
    /// Traffic transcript
    pub transcript: TranscriptConfig,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            set_line_speed: false,
            command_timeout_secs: None,
            max_line_len: None,
            init_commands: DEFAULT_INIT_COMMANDS.iter().map(|c| c.to_string()).collect(),
            transcript: TranscriptConfig::default(),
        }
    }
}

impl ModemConfig {
    /// Default config file location
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        super::config_dir()
            .map(|dir| dir.join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load config from the default location, or defaults if absent
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from `path`
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::default_path()?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        self.save_to(&path)
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Engine settings derived from this config
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            command_timeout: self.command_timeout_secs.map(Duration::from_secs),
            max_line_len: self.max_line_len,
        }
    }
}

/// Transcript settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Record traffic to a file
    pub enabled: bool,
    /// Directory for transcript files
    pub directory: Option<PathBuf>,
    /// File format
    pub format: TranscriptFormat,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: super::log_dir(),
            format: TranscriptFormat::Text,
        }
    }
}

impl TranscriptConfig {
    /// Path of a new transcript file, if enabled and a directory is known
    pub fn new_file_path(&self) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        self.directory
            .as_ref()
            .map(|dir| dir.join(transcript_filename("modem", self.format)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ModemConfig::default();
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.init_commands.first().map(String::as_str), Some("AT"));
        assert!(config.engine_config().command_timeout.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = ModemConfig::default();
        config.serial = SerialConfig::new("/dev/ttyS1", 115_200);
        config.command_timeout_secs = Some(10);
        config.init_commands = vec!["AT".to_string(), "ATE0".to_string()];
        config.save_to(&path).unwrap();

        let loaded = ModemConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(
            loaded.engine_config().command_timeout,
            Some(Duration::from_secs(10))
        );
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_line_len = 512\n").unwrap();

        let loaded = ModemConfig::load_from(&path).unwrap();
        assert_eq!(loaded.max_line_len, Some(512));
        assert_eq!(loaded.serial, SerialConfig::default());
        assert_eq!(loaded.init_commands.len(), DEFAULT_INIT_COMMANDS.len());
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_line_len = \"lots\"\n").unwrap();
        assert!(matches!(
            ModemConfig::load_from(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_transcript_path() {
        let mut transcript = TranscriptConfig {
            enabled: false,
            directory: Some(PathBuf::from("/tmp/logs")),
            format: TranscriptFormat::JsonLines,
        };
        assert!(transcript.new_file_path().is_none());

        transcript.enabled = true;
        let path = transcript.new_file_path().unwrap();
        assert!(path.starts_with("/tmp/logs"));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("jsonl"));
    }
}
