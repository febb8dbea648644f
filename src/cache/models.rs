//! Cache configuration, entry and statistics models.

// Author: kelexine (https://github.com/kelexine)

use crate::config::CacheSettings;
use crate::error::{CacheError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const BYTES_PER_MB: u64 = 1024 * 1024;

// chrono::Duration is bounded at i64::MAX milliseconds.
const MAX_TTL_SECONDS: u64 = (i64::MAX / 1000) as u64;

/// Serialization format of disk tier files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskFormat {
    Json,
}

impl FromStr for DiskFormat {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(DiskFormat::Json),
            other => Err(CacheError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for DiskFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiskFormat::Json => f.write_str("json"),
        }
    }
}

/// Validated, immutable configuration for the caching system.
///
/// Built from [`CacheSettings`]; constructing one guarantees that all limits
/// are strictly positive and that the cache directory exists.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    enabled: bool,
    memory_enabled: bool,
    disk_enabled: bool,
    max_memory_entries: NonZeroUsize,
    max_disk_bytes: u64,
    ttl_seconds: u64,
    cache_dir: PathBuf,
    disk_format: DiskFormat,
}

impl CacheConfig {
    /// Validate raw settings and create the cache directory.
    pub fn from_settings(settings: &CacheSettings) -> Result<Self> {
        let max_memory_entries = NonZeroUsize::new(settings.max_entries)
            .ok_or_else(|| CacheError::Config("max_entries must be positive".to_string()))?;

        if settings.max_disk_cache_size_mb == 0 {
            return Err(CacheError::Config(
                "max_disk_cache_size_mb must be positive".to_string(),
            ));
        }
        let max_disk_bytes = settings
            .max_disk_cache_size_mb
            .checked_mul(BYTES_PER_MB)
            .ok_or_else(|| CacheError::Config("max_disk_cache_size_mb is too large".to_string()))?;

        if settings.cache_expiry_seconds == 0 {
            return Err(CacheError::Config(
                "cache_expiry_seconds must be positive".to_string(),
            ));
        }

        let disk_format = settings.disk_cache_format.parse::<DiskFormat>()?;

        let cache_dir = settings.resolved_cache_dir();
        std::fs::create_dir_all(&cache_dir).map_err(|e| {
            CacheError::Config(format!(
                "cannot create cache directory {}: {}",
                cache_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            enabled: settings.cache_enabled,
            memory_enabled: settings.memory_cache_enabled,
            disk_enabled: settings.disk_cache_enabled,
            max_memory_entries,
            max_disk_bytes,
            ttl_seconds: settings.cache_expiry_seconds,
            cache_dir,
            disk_format,
        })
    }

    /// Default settings rooted at `dir`.
    pub fn for_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::from_settings(&CacheSettings::with_cache_dir(dir))
    }

    /// Default settings at the platform cache directory.
    pub fn load_default() -> Result<Self> {
        Self::from_settings(&CacheSettings::default())
    }

    /// True when the master switch is on and at least one tier is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled && (self.memory_enabled || self.disk_enabled)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn memory_enabled(&self) -> bool {
        self.memory_enabled
    }

    pub fn disk_enabled(&self) -> bool {
        self.disk_enabled
    }

    pub fn max_memory_entries(&self) -> NonZeroUsize {
        self.max_memory_entries
    }

    pub fn max_disk_bytes(&self) -> u64 {
        self.max_disk_bytes
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn disk_format(&self) -> DiskFormat {
        self.disk_format
    }

    /// Settings view of this config, suitable for display or re-validation.
    pub fn to_settings(&self) -> CacheSettings {
        CacheSettings {
            cache_enabled: self.enabled,
            memory_cache_enabled: self.memory_enabled,
            disk_cache_enabled: self.disk_enabled,
            max_entries: self.max_memory_entries.get(),
            max_disk_cache_size_mb: self.max_disk_bytes / BYTES_PER_MB,
            cache_expiry_seconds: self.ttl_seconds,
            cache_dir: Some(self.cache_dir.to_string_lossy().to_string()),
            disk_cache_format: self.disk_format.to_string(),
        }
    }
}

/// A cached artifact together with the metadata needed to validate it.
///
/// Entries are never mutated; a new write replaces the whole entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub source_file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
}

impl CacheEntry {
    pub fn new(
        payload: serde_json::Value,
        source_file_path: impl Into<String>,
        range_string: Option<&str>,
        sheet_name: Option<&str>,
    ) -> Self {
        Self {
            payload,
            created_at: Utc::now(),
            source_file_path: source_file_path.into(),
            range_string: range_string.map(str::to_string),
            sheet_name: sheet_name.map(str::to_string),
        }
    }

    /// Seconds elapsed since creation at `now`. Entries from the future count as fresh.
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_seconds().max(0)
    }

    /// True once the entry has outlived `ttl_seconds`.
    pub fn is_expired(&self, ttl_seconds: u64, now: DateTime<Utc>) -> bool {
        let ttl = ttl_seconds.min(MAX_TTL_SECONDS) as i64;
        now - self.created_at > chrono::Duration::seconds(ttl)
    }
}

/// Memory tier occupancy.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub entries: usize,
    pub capacity: usize,
}

/// Disk tier occupancy.
#[derive(Debug, Clone, Serialize)]
pub struct DiskStats {
    pub files: usize,
    pub total_bytes: u64,
    pub max_bytes: u64,
    pub cache_dir: PathBuf,
}

/// Lookup and write counters for a single manager.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CacheCounters {
    /// Lookups served from the memory tier.
    pub memory_hits: u64,
    /// Lookups served from the disk tier (and promoted).
    pub disk_hits: u64,
    /// Lookups that found nothing usable.
    pub misses: u64,
    /// Entries discarded at read time because of TTL or a missing source file.
    pub expired: u64,
    /// `set` calls stored in at least one tier.
    pub writes: u64,
    /// Disk writes that failed and were dropped.
    pub disk_write_failures: u64,
    /// `set` calls dropped because the source file could not be signed.
    pub unkeyed_writes: u64,
}

impl CacheCounters {
    pub fn hits(&self) -> u64 {
        self.memory_hits + self.disk_hits
    }
}

/// Statistics snapshot for the whole cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub config: CacheSettings,
    pub memory: Option<MemoryStats>,
    pub disk: Option<DiskStats>,
    pub counters: CacheCounters,
}

/// Result of a disk quota enforcement pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct HousekeepingReport {
    /// Cache files seen.
    pub files: usize,
    /// Bytes used after the pass.
    pub total_bytes: u64,
    /// Files deleted to get under quota.
    pub evicted: usize,
    /// Files that could not be deleted and were skipped.
    pub failed: usize,
}

/// Result of [`CacheManager::optimize`](crate::cache::CacheManager::optimize).
#[derive(Debug, Default, Clone, Serialize)]
pub struct OptimizeReport {
    pub scanned: usize,
    /// Disk entries removed because they expired or lost their source file.
    pub stale_removed: usize,
    /// Disk files removed because they could not be decoded.
    pub corrupted_removed: usize,
    /// Leftover temp files from interrupted writes.
    pub temp_removed: usize,
    /// Memory entries purged because they expired.
    pub memory_expired_removed: usize,
    pub errors: Vec<String>,
}
