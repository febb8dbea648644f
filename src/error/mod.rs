// Error types for sheet-cache
// Author: kelexine (https://github.com/kelexine)

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config parsing error: {0}")]
    ConfigParsing(#[from] config::ConfigError),

    #[error("Unsupported disk cache format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupted cache file {}: {reason}", path.display())]
    Corrupted { path: PathBuf, reason: String },
}

impl CacheError {
    /// Configuration faults are surfaced to callers; everything else is
    /// recovered inside the cache.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            CacheError::Config(_) | CacheError::ConfigParsing(_) | CacheError::UnsupportedFormat(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
