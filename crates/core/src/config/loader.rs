use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

use super::{types::Config, ConfigError};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "REELPRESS_CONFIG";
/// Config file used when `REELPRESS_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "reelpress.toml";

fn env_provider() -> Env {
    // Section and field names contain underscores, so nesting uses `__`
    Env::prefixed("REELPRESS_")
        .ignore(&["CONFIG"])
        .split("__")
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Path of the config file: `REELPRESS_CONFIG` or `reelpress.toml`.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load configuration from the default location.
///
/// The file is optional; without it defaults apply, still overridden by the
/// environment. A file named explicitly through `REELPRESS_CONFIG` must exist.
pub fn load_default_config() -> Result<Config, ConfigError> {
    let path = config_path();
    if path.exists() {
        return load_config(&path);
    }
    if std::env::var_os(CONFIG_PATH_ENV).is_some() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::new()
        .merge(env_provider())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
