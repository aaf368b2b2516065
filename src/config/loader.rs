//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServiceConfig;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Load configuration from a TOML file. Missing fields take defaults.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ServiceConfig = toml::from_str(&content)?;
    Ok(config)
}
