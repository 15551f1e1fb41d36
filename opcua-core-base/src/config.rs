//! Yaml backed configuration handling.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use tracing::error;

/// Errors arising from loading or saving a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading or writing the file failed.
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    /// The file content did not parse.
    #[error("config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// The parsed config failed its own validation.
    #[error("config is invalid")]
    Invalid,
}

/// A serializable configuration that can load from and save to yaml files.
pub trait Config: Serialize + DeserializeOwned {
    /// Check the parsed values for consistency.
    fn is_valid(&self) -> bool {
        true
    }

    /// Load and validate a configuration from the given path.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        if !config.is_valid() {
            error!("Config at {} failed validation", path.display());
            return Err(ConfigError::Invalid);
        }
        Ok(config)
    }

    /// Save the configuration to the given path.
    fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if !self.is_valid() {
            return Err(ConfigError::Invalid);
        }
        let contents = serde_yaml::to_string(self)?;
        let mut file = File::create(path)?;
        file.write_all(contents.as_bytes())?;
        Ok(())
    }
}
