// Configuration module
// Author: kelexine (https://github.com/kelexine)

mod models;

pub use models::*;

use crate::cache::CacheConfig;
use crate::error::{CacheError, Result};
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest, prefix `SHEET_CACHE__`)
    /// 2. Config file
    /// 3. Defaults (lowest)
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_config_path())
    }

    /// Same as [`AppConfig::load`] but reads the TOML file at `path`.
    /// A missing file is not an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&Self::default())?)
            // Load from config file if it exists
            .add_source(File::from(path.to_path_buf()).required(false))
            // Override with environment variables, e.g. SHEET_CACHE__CACHE__MAX_ENTRIES
            .add_source(
                Environment::with_prefix("SHEET_CACHE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| CacheError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| CacheError::Config(e.to_string()))
    }

    /// Validated cache configuration for this application config.
    pub fn cache_config(&self) -> Result<CacheConfig> {
        self.cache.validate()
    }

    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAMESPACE)
            .join("config.toml")
    }
}

impl CacheSettings {
    /// Validate the raw settings and build an immutable [`CacheConfig`].
    ///
    /// Creates the cache directory as a side effect.
    pub fn validate(&self) -> Result<CacheConfig> {
        CacheConfig::from_settings(self)
    }
}
