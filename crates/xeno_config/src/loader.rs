//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::XenoformConfig;
use std::path::Path;

/// Name of the configuration file looked up in the project directory.
pub const CONFIG_FILE: &str = "xenoform.toml";

/// Loads and validates `xenoform.toml` from a project directory.
pub fn load_config(project_dir: &Path) -> Result<XenoformConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::IoError {
        path: config_path.clone(),
        source,
    })?;
    load_config_from_str(&content)
}

/// Loads `xenoform.toml` if present, otherwise returns the default configuration.
///
/// A file that exists but fails to parse or validate is still an error.
pub fn load_config_or_default(project_dir: &Path) -> Result<XenoformConfig, ConfigError> {
    if project_dir.join(CONFIG_FILE).is_file() {
        load_config(project_dir)
    } else {
        Ok(XenoformConfig::default())
    }
}

/// Parses and validates a `xenoform.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<XenoformConfig, ConfigError> {
    let config: XenoformConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &XenoformConfig) -> Result<(), ConfigError> {
    let invalid = |field, reason| Err(ConfigError::ValidationError { field, reason });
    if config.extensions.module_root_dir.as_os_str().is_empty() {
        return invalid("extensions.module_root_dir", "must not be empty");
    }
    if config.toolchain.compiler.trim().is_empty() {
        return invalid("toolchain.compiler", "must name an executable");
    }
    if config.cache.function_capacity == 0 {
        return invalid("cache.function_capacity", "must be at least 1");
    }
    Ok(())
}
