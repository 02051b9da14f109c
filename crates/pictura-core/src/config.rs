//! Configuration file support.
//!
//! Settings are read from `~/.pictura/config.toml` and then `./.picturarc`; values
//! in the local file override the global one. Command-line flags are applied on
//! top by the caller.

use pictura_training::{Architecture, HyperParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PicturaConfig {
    /// Path of the SQLite database
    #[serde(default)]
    pub database: Option<String>,

    /// Log level
    #[serde(default)]
    pub log_level: Option<String>,

    /// Default training hyperparameters
    #[serde(default)]
    pub training: TrainingDefaults,
}

/// Overrides for `HyperParams`; unset fields keep the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epochs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<Architecture>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_split: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl TrainingDefaults {
    pub fn merge(&mut self, other: &Self) {
        self.epochs = other.epochs.or(self.epochs);
        self.batch_size = other.batch_size.or(self.batch_size);
        self.learning_rate = other.learning_rate.or(self.learning_rate);
        self.architecture = other.architecture.or(self.architecture);
        self.validation_split = other.validation_split.or(self.validation_split);
        self.seed = other.seed.or(self.seed);
    }

    pub fn apply(&self, params: &mut HyperParams) {
        if let Some(epochs) = self.epochs {
            params.epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            params.batch_size = batch_size;
        }
        if let Some(learning_rate) = self.learning_rate {
            params.learning_rate = learning_rate;
        }
        if let Some(architecture) = self.architecture {
            params.architecture = architecture;
        }
        if let Some(validation_split) = self.validation_split {
            params.validation_split = validation_split;
        }
        if let Some(seed) = self.seed {
            params.seed = seed;
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

fn home_dir() -> PathBuf {
    std::env::var("HOME").map_or_else(|_| PathBuf::from("."), PathBuf::from)
}

impl PicturaConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(format!("Failed to serialize: {}", e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::ReadError(format!("Failed to create directory: {}", e)))?;
        }

        std::fs::write(path, content)
            .map_err(|e| ConfigError::ReadError(format!("Failed to write file: {}", e)))?;

        Ok(())
    }

    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        home_dir().join(".pictura").join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".picturarc")
    }

    /// Database used when neither the config nor the command line names one.
    pub fn default_database_path() -> PathBuf {
        home_dir().join(".pictura").join("pictura.db")
    }

    /// Discover and load configuration files.
    ///
    /// A missing file is skipped. A file that exists but cannot be read or parsed
    /// is an error.
    pub fn discover_and_load() -> ConfigResult<Self> {
        Self::load_layers(&[Self::default_global_path(), Self::default_local_path()])
    }

    /// Loads each existing file in order, later files overriding earlier ones.
    pub fn load_layers(paths: &[PathBuf]) -> ConfigResult<Self> {
        let mut config = Self::default();
        for path in paths {
            match Self::load_from_file(path) {
                Ok(layer) => config.merge(&layer),
                Err(ConfigError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(config)
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &Self) {
        if let Some(ref database) = other.database {
            self.database = Some(database.clone());
        }
        if let Some(ref log_level) = other.log_level {
            self.log_level = Some(log_level.clone());
        }
        self.training.merge(&other.training);
    }

    pub fn database_path(&self) -> PathBuf {
        self.database.as_ref().map_or_else(Self::default_database_path, PathBuf::from)
    }

    /// Built-in hyperparameters with the `[training]` section applied.
    ///
    /// # Errors
    /// * `ConfigError::InvalidValue` - If the resulting hyperparameters are not trainable
    pub fn hyperparams(&self) -> ConfigResult<HyperParams> {
        let mut params = HyperParams::default();
        self.training.apply(&mut params);
        params.validate().map_err(|e| ConfigError::InvalidValue(format!("[training] {e}")))?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config_content = r#"
database = "/data/pictura.db"
log_level = "debug"

[training]
epochs = 20
learning_rate = 0.01
architecture = "transfer"
"#;

        std::fs::write(&config_path, config_content).unwrap();

        let config = PicturaConfig::load_from_file(&config_path).unwrap();
        assert_eq!(config.database, Some("/data/pictura.db".to_string()));
        assert_eq!(config.log_level, Some("debug".to_string()));
        assert_eq!(config.training.epochs, Some(20));
        assert_eq!(config.training.architecture, Some(Architecture::Transfer));
        assert_eq!(config.training.batch_size, None);
        assert_eq!(config.database_path(), PathBuf::from("/data/pictura.db"));
    }

    #[test]
    fn test_defaults_when_empty() {
        let config = PicturaConfig::default();
        let params = config.hyperparams().unwrap();
        assert_eq!(params, HyperParams::default());
        assert!(config.database_path().ends_with(".pictura/pictura.db"));
    }

    #[test]
    fn test_merge_prefers_later_layer() {
        let temp_dir = TempDir::new().unwrap();
        let global = temp_dir.path().join("global.toml");
        let local = temp_dir.path().join("local.toml");
        let missing = temp_dir.path().join("missing.toml");

        std::fs::write(&global, "log_level = \"info\"\n[training]\nepochs = 10\nbatch_size = 8\n").unwrap();
        std::fs::write(&local, "[training]\nepochs = 30\n").unwrap();

        let config = PicturaConfig::load_layers(&[global, missing, local]).unwrap();
        assert_eq!(config.log_level, Some("info".to_string()));

        let params = config.hyperparams().unwrap();
        assert_eq!(params.epochs, 30);
        assert_eq!(params.batch_size, 8);
        assert_eq!(params.learning_rate, HyperParams::default().learning_rate);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        std::fs::write(&path, "[training\nepochs = ").unwrap();

        assert!(matches!(PicturaConfig::load_from_file(&path), Err(ConfigError::ParseError(_))));
        assert!(matches!(PicturaConfig::load_layers(&[path]), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_invalid_training_values() {
        let config = PicturaConfig {
            training: TrainingDefaults { batch_size: Some(0), ..Default::default() },
            ..Default::default()
        };
        assert!(matches!(config.hyperparams(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let config = PicturaConfig {
            log_level: Some("warn".to_string()),
            training: TrainingDefaults { seed: Some(9), ..Default::default() },
            ..Default::default()
        };

        config.save_to_file(&config_path).unwrap();
        let loaded = PicturaConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded, config);
    }
}
