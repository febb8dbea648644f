//! Configuration data structures for sheet-cache.
//!
//! This module defines the raw, user-facing settings schema. Values here are
//! unvalidated; `CacheSettings::validate` turns them into an immutable
//! [`CacheConfig`](crate::cache::CacheConfig).
//!
//! Author: kelexine (<https://github.com/kelexine>)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Namespace appended to the platform cache and config directories.
pub const APP_NAMESPACE: &str = "sheet-cache";

/// The root configuration object for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Two-tier cache settings.
    #[serde(default)]
    pub cache: CacheSettings,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for the memory and disk cache tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Master switch. When `false` every lookup misses and every write is a no-op.
    /// Default: `true`
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Whether the in-process LRU tier is used.
    /// Default: `true`
    #[serde(default = "default_true")]
    pub memory_cache_enabled: bool,

    /// Whether the persistent disk tier is used.
    /// Default: `true`
    #[serde(default = "default_true")]
    pub disk_cache_enabled: bool,

    /// Capacity of the memory tier, in entries.
    /// Default: `100`
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Disk tier quota in megabytes.
    /// Default: `1024` (1 GiB)
    #[serde(default = "default_max_disk_cache_size_mb")]
    pub max_disk_cache_size_mb: u64,

    /// Lifetime of an entry in seconds.
    /// Default: `86400` (24 hours)
    #[serde(default = "default_cache_expiry_seconds")]
    pub cache_expiry_seconds: u64,

    /// Directory holding the disk tier. `None` selects the platform cache
    /// directory (`$XDG_CACHE_HOME`, `%LOCALAPPDATA%`, ...) plus `sheet-cache`.
    #[serde(default)]
    pub cache_dir: Option<String>,

    /// Serialization format of disk entries. Only `json` is supported.
    /// Default: `json`
    #[serde(default = "default_disk_cache_format")]
    pub disk_cache_format: String,
}

/// Settings for application logging and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Default: `info`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for logs (`pretty`, `json`, `compact`).
    /// Default: `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            memory_cache_enabled: true,
            disk_cache_enabled: true,
            max_entries: default_max_entries(),
            max_disk_cache_size_mb: default_max_disk_cache_size_mb(),
            cache_expiry_seconds: default_cache_expiry_seconds(),
            cache_dir: None,
            disk_cache_format: default_disk_cache_format(),
        }
    }
}

impl CacheSettings {
    /// Settings identical to the defaults but rooted at `dir`.
    pub fn with_cache_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: Some(dir.into().to_string_lossy().to_string()),
            ..Self::default()
        }
    }

    /// Resolved cache directory, falling back to the platform default.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        match &self.cache_dir {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => default_cache_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Helper functions for serde defaults and shared constants
fn default_true() -> bool {
    true
}

fn default_max_entries() -> usize {
    100
}

fn default_max_disk_cache_size_mb() -> u64 {
    1024
}

fn default_cache_expiry_seconds() -> u64 {
    24 * 60 * 60
}

fn default_disk_cache_format() -> String {
    "json".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Platform cache directory (`dirs::cache_dir`) suffixed with the app namespace.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAMESPACE)
}
