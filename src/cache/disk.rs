//! Persistent disk tier.
//!
//! Each entry lives in its own file named `<sha256(key)>.cache` inside a flat
//! cache directory. Files hold a JSON [`DiskRecord`] envelope that repeats the
//! key, so a record that decodes but belongs to a different key is treated as
//! corrupt. Writes go through a temporary file in the same directory that is
//! renamed into place, so readers see either the old file or the new one.
//!
//! The tier keeps no index: quota enforcement lists the directory and evicts
//! the oldest files by modification time.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use super::key::CacheKey;
use super::models::{CacheEntry, HousekeepingReport};
use crate::error::{CacheError, Result};
use crate::metrics;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Extension of files owned by the tier.
pub const CACHE_FILE_EXTENSION: &str = "cache";

/// Temp files older than this are leftovers from interrupted writes.
pub const STALE_TEMP_AGE: Duration = Duration::from_secs(3600);

const FORMAT_VERSION: u32 = 1;
const TEMP_FILE_PREFIX: &str = ".sheet-cache-";
const TEMP_FILE_SUFFIX: &str = ".tmp";

/// On-disk envelope around a [`CacheEntry`].
#[derive(Debug, Serialize, Deserialize)]
struct DiskRecord {
    format_version: u32,
    key: String,
    entry: CacheEntry,
}

/// A cache file as seen by a directory scan.
#[derive(Debug, Clone)]
pub struct CacheFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

/// Durable key -> entry storage with a byte quota.
pub struct DiskTier {
    cache_dir: PathBuf,
    max_bytes: u64,
}

impl DiskTier {
    /// Open (and create if needed) the tier rooted at `cache_dir`.
    pub fn new(cache_dir: impl Into<PathBuf>, max_bytes: u64) -> Result<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            cache_dir,
            max_bytes,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        let hashed = hex::encode(Sha256::digest(key.as_str().as_bytes()));
        self.cache_dir
            .join(format!("{}.{}", hashed, CACHE_FILE_EXTENSION))
    }

    /// Fetch the entry for `key`. Corrupt files are deleted and reported as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        match self.try_get(key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Disk cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    /// Like [`DiskTier::get`] but surfaces I/O errors. Corruption is still
    /// handled here by deleting the file and returning `Ok(None)`.
    pub fn try_get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match decode(&path, &bytes, Some(key)) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!("Removing corrupted cache file: {}", e);
                self.remove_path(&path);
                metrics::record_disk_removal("corrupted");
                Ok(None)
            }
        }
    }

    /// Store `entry` under `key`, then enforce the quota.
    ///
    /// Failures are logged and swallowed. Returns whether the write landed.
    pub fn set(&self, key: &CacheKey, entry: &CacheEntry) -> bool {
        match self.try_set(key, entry) {
            Ok(()) => {
                self.housekeeping();
                true
            }
            Err(e) => {
                warn!("Failed to write disk cache entry {}: {}", key, e);
                false
            }
        }
    }

    /// Write without housekeeping, returning the typed error on failure. A
    /// failed write leaves no partial file behind.
    pub fn try_set(&self, key: &CacheKey, entry: &CacheEntry) -> Result<()> {
        let record = DiskRecord {
            format_version: FORMAT_VERSION,
            key: key.as_str().to_string(),
            entry: entry.clone(),
        };
        let bytes = serde_json::to_vec(&record)?;

        // The temp file is deleted on drop if anything below fails.
        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .suffix(TEMP_FILE_SUFFIX)
            .tempfile_in(&self.cache_dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_data()?;
        tmp.persist(self.path_for(key)).map_err(|e| e.error)?;

        debug!("Wrote {} bytes to disk cache for {}", bytes.len(), key);
        Ok(())
    }

    /// Delete the file for `key`. Returns whether a file was removed.
    pub fn remove(&self, key: &CacheKey) -> bool {
        self.remove_path(&self.path_for(key))
    }

    /// Delete `path` if it is a cache file owned by this tier.
    pub fn remove_path(&self, path: &Path) -> bool {
        if !self.owns(path) {
            return false;
        }
        match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!("Failed to delete cache file {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Decode a cache file found by [`DiskTier::cache_files`].
    pub fn read_file(&self, path: &Path) -> Result<CacheEntry> {
        let bytes = fs::read(path)?;
        decode(path, &bytes, None)
    }

    /// All cache files in the directory. Unreadable directory entries are skipped.
    pub fn cache_files(&self) -> Result<Vec<CacheFile>> {
        let mut files = Vec::new();
        for dir_entry in fs::read_dir(&self.cache_dir)? {
            let dir_entry = match dir_entry {
                Ok(dir_entry) => dir_entry,
                Err(e) => {
                    debug!("Skipping unreadable directory entry: {}", e);
                    continue;
                }
            };
            let path = dir_entry.path();
            if !self.owns(&path) {
                continue;
            }
            match dir_entry.metadata() {
                Ok(meta) if meta.is_file() => files.push(CacheFile {
                    path,
                    size: meta.len(),
                    modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                }),
                Ok(_) => {}
                Err(e) => debug!("Skipping {}: {}", path.display(), e),
            }
        }
        Ok(files)
    }

    /// `(file count, total bytes)` currently used.
    pub fn usage(&self) -> Result<(usize, u64)> {
        let files = self.cache_files()?;
        let total = files.iter().map(|f| f.size).sum();
        Ok((files.len(), total))
    }

    /// Enforce the quota by deleting the oldest-modified files until the total
    /// is back under `max_bytes`. Files that cannot be deleted are skipped.
    pub fn housekeeping(&self) -> HousekeepingReport {
        let mut files = match self.cache_files() {
            Ok(files) => files,
            Err(e) => {
                warn!("Disk cache housekeeping could not list {}: {}", self.cache_dir.display(), e);
                return HousekeepingReport::default();
            }
        };

        let mut report = HousekeepingReport {
            files: files.len(),
            total_bytes: files.iter().map(|f| f.size).sum(),
            ..Default::default()
        };

        if report.total_bytes > self.max_bytes {
            files.sort_by_key(|f| f.modified);
            for file in &files {
                if report.total_bytes <= self.max_bytes {
                    break;
                }
                match fs::remove_file(&file.path) {
                    Ok(()) => {
                        report.total_bytes = report.total_bytes.saturating_sub(file.size);
                        report.evicted += 1;
                        metrics::record_disk_removal("quota");
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        // Raced with another writer or process.
                        report.total_bytes = report.total_bytes.saturating_sub(file.size);
                    }
                    Err(e) => {
                        warn!("Failed to evict cache file {}: {}", file.path.display(), e);
                        report.failed += 1;
                    }
                }
            }
            info!(
                "Disk cache over quota: evicted {} files, {} bytes remain (max {})",
                report.evicted, report.total_bytes, self.max_bytes
            );
        }

        metrics::update_disk_usage(report.total_bytes);
        report
    }

    /// Delete every cache file. Returns the number removed.
    pub fn clear(&self) -> usize {
        let files = match self.cache_files() {
            Ok(files) => files,
            Err(e) => {
                warn!("Failed to list disk cache for clearing: {}", e);
                return 0;
            }
        };
        let removed = files.iter().filter(|f| self.remove_path(&f.path)).count();
        self.sweep_temp_files(STALE_TEMP_AGE);
        metrics::update_disk_usage(0);
        removed
    }

    /// Delete temp files left behind by writes that never reached the rename,
    /// once they are at least `older_than` old. Returns the number removed.
    pub fn sweep_temp_files(&self, older_than: Duration) -> usize {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to list disk cache for temp sweep: {}", e);
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;
        for dir_entry in entries.flatten() {
            let path = dir_entry.path();
            if !is_temp_file(&path) {
                continue;
            }
            let stale = dir_entry
                .metadata()
                .ok()
                .filter(|meta| meta.is_file())
                .and_then(|meta| meta.modified().ok())
                .and_then(|modified| now.duration_since(modified).ok())
                .map(|age| age >= older_than)
                .unwrap_or(false);
            if !stale {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    removed += 1;
                    metrics::record_disk_removal("temp");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to delete temp file {}: {}", path.display(), e),
            }
        }

        if removed > 0 {
            info!("Removed {} stale temp files from disk cache", removed);
        }
        removed
    }

    /// Only `<64 hex>.cache` files directly inside the cache directory belong to us.
    fn owns(&self, path: &Path) -> bool {
        if path.parent() != Some(self.cache_dir.as_path()) {
            return false;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(CACHE_FILE_EXTENSION) {
            return false;
        }
        path.file_stem()
            .and_then(|s| s.to_str())
            .map(|stem| stem.len() == 64 && stem.bytes().all(|b| b.is_ascii_hexdigit()))
            .unwrap_or(false)
    }
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(TEMP_FILE_PREFIX) && n.ends_with(TEMP_FILE_SUFFIX))
        .unwrap_or(false)
}

fn decode(path: &Path, bytes: &[u8], expected: Option<&CacheKey>) -> Result<CacheEntry> {
    let corrupted = |reason: String| CacheError::Corrupted {
        path: path.to_path_buf(),
        reason,
    };

    let record: DiskRecord =
        serde_json::from_slice(bytes).map_err(|e| corrupted(e.to_string()))?;

    if record.format_version != FORMAT_VERSION {
        return Err(corrupted(format!(
            "unsupported format version {}",
            record.format_version
        )));
    }
    if let Some(expected) = expected {
        if record.key != expected.as_str() {
            return Err(corrupted(format!("key mismatch: {}", record.key)));
        }
    }
    Ok(record.entry)
}
