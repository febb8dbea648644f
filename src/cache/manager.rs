// Cache manager - two-tier read-through / write-through orchestration
// Author: kelexine (https://github.com/kelexine)

use crate::cache::disk::{DiskTier, STALE_TEMP_AGE};
use crate::cache::key::{CacheKey, KeyGenerator};
use crate::cache::memory::MemoryTier;
use crate::cache::models::{
    CacheConfig, CacheCounters, CacheEntry, CacheStats, DiskStats, MemoryStats, OptimizeReport,
};
use crate::error::Result;
use crate::metrics;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

/// Front door of the caching subsystem.
///
/// Lookups go memory -> disk -> miss, with disk hits promoted into memory.
/// Writes go to every enabled tier. Runtime failures never reach the caller:
/// they are logged and turned into a miss or a dropped write.
pub struct CacheManager {
    config: CacheConfig,
    keys: KeyGenerator,
    memory: Option<MemoryTier>,
    disk: Option<DiskTier>,
    counters: RwLock<CacheCounters>,
}

impl CacheManager {
    /// Create a cache manager for a validated configuration.
    ///
    /// # Errors
    ///
    /// Fails only if the disk tier's directory cannot be created.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_key_generator(config, KeyGenerator::default())
    }

    /// Create a cache manager with a custom key generator.
    pub fn with_key_generator(config: CacheConfig, keys: KeyGenerator) -> Result<Self> {
        let memory = if config.memory_enabled() {
            info!(
                "Initialized memory cache with {} entries",
                config.max_memory_entries()
            );
            Some(MemoryTier::new(config.max_memory_entries()))
        } else {
            None
        };

        let disk = if config.disk_enabled() {
            let disk = DiskTier::new(config.cache_dir(), config.max_disk_bytes())?;
            info!("Initialized disk cache at {}", config.cache_dir().display());
            Some(disk)
        } else {
            None
        };

        Ok(Self {
            config,
            keys,
            memory,
            disk,
            counters: RwLock::new(CacheCounters::default()),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Key under which `(file_path, range, sheet)` is stored.
    pub fn key_for(&self, file_path: &Path, range: Option<&str>, sheet: Option<&str>) -> CacheKey {
        self.keys.generate(file_path, range, sheet)
    }

    /// Retrieve a cached payload, or `None` on a miss.
    pub fn get(
        &self,
        file_path: impl AsRef<Path>,
        range: Option<&str>,
        sheet: Option<&str>,
    ) -> Option<Value> {
        self.get_entry(file_path.as_ref(), range, sheet)
            .map(|entry| entry.payload)
    }

    /// Retrieve and deserialize a cached payload. A payload that does not
    /// decode as `T` is reported as a miss.
    pub fn get_as<T: DeserializeOwned>(
        &self,
        file_path: impl AsRef<Path>,
        range: Option<&str>,
        sheet: Option<&str>,
    ) -> Option<T> {
        let payload = self.get(file_path, range, sheet)?;
        match serde_json::from_value(payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Cached payload has unexpected shape: {}", e);
                None
            }
        }
    }

    /// Retrieve the full cached entry, including its metadata.
    pub fn get_entry(
        &self,
        file_path: &Path,
        range: Option<&str>,
        sheet: Option<&str>,
    ) -> Option<CacheEntry> {
        if !self.config.is_enabled() {
            return None;
        }

        let key = self.key_for(file_path, range, sheet);
        let now = Utc::now();
        // Tier in which this lookup first found an expired entry.
        let mut expired_in = None;

        // Try memory cache first
        if let Some(memory) = &self.memory {
            if let Some(entry) = memory.get(&key) {
                if !entry.is_expired(self.config.ttl_seconds(), now) {
                    debug!("Cache hit (memory): {}", key);
                    self.counters.write().memory_hits += 1;
                    metrics::record_memory_hit();
                    return Some(entry);
                }
                debug!("Cache expired (memory): {}", key);
                memory.remove(&key);
                expired_in = Some("memory");
            }
        }

        // Try disk cache
        if let Some(disk) = &self.disk {
            if let Some(entry) = disk.get(&key) {
                if self.is_entry_valid(&entry, now) {
                    debug!("Cache hit (disk): {}", key);
                    if let Some(memory) = &self.memory {
                        memory.set(key, entry.clone());
                        metrics::update_memory_entries(memory.len());
                    }
                    self.counters.write().disk_hits += 1;
                    metrics::record_disk_hit();
                    return Some(entry);
                }
                debug!("Cache expired (disk): {}", key);
                if disk.remove(&key) {
                    metrics::record_disk_removal("stale");
                }
                expired_in.get_or_insert("disk");
            }
        }

        if let Some(tier) = expired_in {
            self.counters.write().expired += 1;
            metrics::record_expired(tier);
        }

        debug!("Cache miss: {}", key);
        self.counters.write().misses += 1;
        metrics::record_miss();
        None
    }

    /// Cache `payload` for `(file_path, range, sheet)` in every enabled tier.
    pub fn set(
        &self,
        file_path: impl AsRef<Path>,
        payload: Value,
        range: Option<&str>,
        sheet: Option<&str>,
    ) {
        if !self.config.is_enabled() {
            return;
        }

        let file_path = file_path.as_ref();
        let key = self.key_for(file_path, range, sheet);
        if key.is_error_key() {
            // No lookup can ever produce this key again.
            debug!("Skipping cache write for unsignable {}", file_path.display());
            self.counters.write().unkeyed_writes += 1;
            return;
        }
        let entry = CacheEntry::new(payload, file_path.to_string_lossy(), range, sheet);
        let mut stored = false;

        if let Some(memory) = &self.memory {
            memory.set(key.clone(), entry.clone());
            metrics::record_write("memory", true);
            metrics::update_memory_entries(memory.len());
            debug!("Cached in memory: {}", key);
            stored = true;
        }

        if let Some(disk) = &self.disk {
            let written = disk.set(&key, &entry);
            metrics::record_write("disk", written);
            if written {
                debug!("Cached on disk: {}", key);
                stored = true;
            } else {
                self.counters.write().disk_write_failures += 1;
            }
        }

        if stored {
            self.counters.write().writes += 1;
        }
    }

    /// Serialize `value` and cache it. Serialization failures drop the write.
    pub fn set_from<T: Serialize>(
        &self,
        file_path: impl AsRef<Path>,
        value: &T,
        range: Option<&str>,
        sheet: Option<&str>,
    ) {
        match serde_json::to_value(value) {
            Ok(payload) => self.set(file_path, payload, range, sheet),
            Err(e) => warn!("Failed to serialize payload for caching: {}", e),
        }
    }

    /// A disk entry is usable while it is within TTL and its source file
    /// still exists. Changed files already produce a different key.
    fn is_entry_valid(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        if entry.is_expired(self.config.ttl_seconds(), now) {
            return false;
        }
        if entry.source_file_path.is_empty() {
            return true;
        }
        Path::new(&entry.source_file_path).exists()
    }

    /// Clear all caches.
    pub fn clear(&self) {
        if let Some(memory) = &self.memory {
            memory.clear();
            metrics::update_memory_entries(0);
            info!("Cleared memory cache");
        }

        if let Some(disk) = &self.disk {
            let removed = disk.clear();
            info!("Cleared disk cache ({} files)", removed);
        }
    }

    /// Remove expired entries from both tiers and corrupted files from disk.
    pub fn optimize(&self) -> OptimizeReport {
        let mut report = OptimizeReport::default();
        let now = Utc::now();
        let ttl = self.config.ttl_seconds();

        if let Some(memory) = &self.memory {
            report.memory_expired_removed = memory.retain(|_, entry| !entry.is_expired(ttl, now));
            metrics::update_memory_entries(memory.len());
        }

        if let Some(disk) = &self.disk {
            let files = match disk.cache_files() {
                Ok(files) => files,
                Err(e) => {
                    report
                        .errors
                        .push(format!("Failed to optimize disk cache: {}", e));
                    return report;
                }
            };

            for file in files {
                report.scanned += 1;
                match disk.read_file(&file.path) {
                    Ok(entry) => {
                        if !self.is_entry_valid(&entry, now) && disk.remove_path(&file.path) {
                            report.stale_removed += 1;
                            metrics::record_disk_removal("stale");
                        }
                    }
                    Err(e) => {
                        if disk.remove_path(&file.path) {
                            report.corrupted_removed += 1;
                            metrics::record_disk_removal("corrupted");
                        }
                        report
                            .errors
                            .push(format!("Removed corrupted cache file: {}", e));
                    }
                }
            }

            report.temp_removed = disk.sweep_temp_files(STALE_TEMP_AGE);
        }

        info!(
            "Cache optimized: scanned {}, stale {}, corrupted {}, temp {}, memory expired {}",
            report.scanned,
            report.stale_removed,
            report.corrupted_removed,
            report.temp_removed,
            report.memory_expired_removed
        );
        report
    }

    /// Get cache statistics
    pub fn get_stats(&self) -> CacheStats {
        let memory = self.memory.as_ref().map(|memory| MemoryStats {
            entries: memory.len(),
            capacity: memory.capacity(),
        });

        let disk = self.disk.as_ref().map(|disk| {
            let (files, total_bytes) = disk.usage().unwrap_or_else(|e| {
                warn!("Failed to read disk cache usage: {}", e);
                (0, 0)
            });
            DiskStats {
                files,
                total_bytes,
                max_bytes: disk.max_bytes(),
                cache_dir: disk.cache_dir().to_path_buf(),
            }
        });

        CacheStats {
            config: self.config.to_settings(),
            memory,
            disk,
            counters: self.counters.read().clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn memory_tier(&self) -> Option<&MemoryTier> {
        self.memory.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn disk_tier(&self) -> Option<&DiskTier> {
        self.disk.as_ref()
    }
}
