// Cache key derivation - file signature + view parameters
// Author: kelexine (https://github.com/kelexine)

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

/// Files smaller than this are content-hashed in addition to size + mtime.
pub const SMALL_FILE_THRESHOLD: u64 = 1024 * 1024;

/// Hex characters kept from the final digest.
const KEY_LEN: usize = 32;
/// Hex characters kept from the content digest of small files.
const CONTENT_HASH_LEN: usize = 16;
const ERROR_PREFIX: &str = "error:";

/// Opaque cache key identifying one (file state, view) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for keys produced by the I/O failure fallback. These never match
    /// a stored entry.
    pub fn is_error_key(&self) -> bool {
        self.0.starts_with(ERROR_PREFIX)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derives cache keys from a file's identity and the requested view.
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    small_file_threshold: u64,
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self {
            small_file_threshold: SMALL_FILE_THRESHOLD,
        }
    }
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator with a custom content-hash threshold in bytes.
    pub fn with_small_file_threshold(small_file_threshold: u64) -> Self {
        Self {
            small_file_threshold,
        }
    }

    /// Derive the key for `(file_path, range, sheet)`.
    ///
    /// Never fails: if the file cannot be inspected the result is an error key
    /// that is unique per call and therefore always misses.
    pub fn generate(&self, file_path: &Path, range: Option<&str>, sheet: Option<&str>) -> CacheKey {
        match self.try_generate(file_path, range, sheet) {
            Ok(key) => key,
            Err(e) => {
                warn!(
                    "Failed to calculate file signature for {}: {}",
                    file_path.display(),
                    e
                );
                error_key(file_path)
            }
        }
    }

    /// Fallible key derivation; I/O failures are returned instead of masked.
    pub fn try_generate(
        &self,
        file_path: &Path,
        range: Option<&str>,
        sheet: Option<&str>,
    ) -> Result<CacheKey> {
        let mut material = self.file_signature(file_path)?;

        if let Some(range) = range.filter(|r| !r.is_empty()) {
            material.push_str("|range:");
            material.push_str(range);
        }
        if let Some(sheet) = sheet.filter(|s| !s.is_empty()) {
            material.push_str("|sheet:");
            material.push_str(sheet);
        }

        let digest = hex::encode(Sha256::digest(material.as_bytes()));
        Ok(CacheKey(digest[..KEY_LEN].to_string()))
    }

    /// `name:size:mtime_ns[:content16]`, or `missing:<path>` for absent files.
    fn file_signature(&self, file_path: &Path) -> Result<String> {
        let metadata = match fs::metadata(file_path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Signing missing file {}", file_path.display());
                return Ok(format!("missing:{}", file_path.display()));
            }
            Err(e) => return Err(e.into()),
        };

        // Directories, FIFOs and devices cannot be signed without blocking.
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", file_path.display()),
            )
            .into());
        }

        let name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let size = metadata.len();
        let mtime_ns = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);

        let mut signature = format!("{}:{}:{}", name, size, mtime_ns);

        if size < self.small_file_threshold {
            let content = fs::read(file_path)?;
            let content_hash = hex::encode(Sha256::digest(&content));
            signature.push(':');
            signature.push_str(&content_hash[..CONTENT_HASH_LEN]);
        }

        Ok(signature)
    }
}

/// Fallback key: hash of the path plus the current time. Never a valid 32-hex key.
fn error_key(file_path: &Path) -> CacheKey {
    let path_hash = hex::encode(Sha256::digest(file_path.to_string_lossy().as_bytes()));
    let now_ns = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default();
    CacheKey(format!(
        "{}{}:{}",
        ERROR_PREFIX,
        &path_hash[..CONTENT_HASH_LEN],
        now_ns
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    fn set_mtime(path: &Path, mtime: SystemTime) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(mtime).unwrap();
    }

    #[test]
    fn test_key_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.csv", b"a,b\n1,2\n");
        let keys = KeyGenerator::new();

        let key1 = keys.generate(&path, Some("A1:B2"), Some("Sheet1"));
        let key2 = keys.generate(&path, Some("A1:B2"), Some("Sheet1"));

        assert_eq!(key1, key2);
        assert_eq!(key1.as_str().len(), KEY_LEN);
        assert!(!key1.is_error_key());
    }

    #[test]
    fn test_view_changes_key() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.csv", b"a,b\n1,2\n");
        let keys = KeyGenerator::new();

        let base = keys.generate(&path, None, None);
        let ranged = keys.generate(&path, Some("A1:B2"), None);
        let other_range = keys.generate(&path, Some("A1:B3"), None);
        let sheet = keys.generate(&path, None, Some("Sheet1"));

        assert_ne!(base, ranged);
        assert_ne!(ranged, other_range);
        assert_ne!(base, sheet);
        assert_ne!(ranged, sheet);
    }

    #[test]
    fn test_empty_view_parameters_are_ignored() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.csv", b"x");
        let keys = KeyGenerator::new();

        assert_eq!(
            keys.generate(&path, None, None),
            keys.generate(&path, Some(""), Some(""))
        );
    }

    #[test]
    fn test_mtime_changes_key() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.csv", b"same");
        let keys = KeyGenerator::new();

        set_mtime(&path, UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        let before = keys.generate(&path, None, None);
        set_mtime(&path, UNIX_EPOCH + Duration::from_secs(1_700_000_100));
        let after = keys.generate(&path, None, None);

        assert_ne!(before, after);
    }

    #[test]
    fn test_content_changes_key_for_small_files() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.csv", b"aaaa");
        let keys = KeyGenerator::new();
        let mtime = UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        set_mtime(&path, mtime);
        let before = keys.generate(&path, None, None);

        // Same size, same mtime, different bytes.
        write_file(&dir, "a.csv", b"bbbb");
        set_mtime(&path, mtime);
        let after = keys.generate(&path, None, None);

        assert_ne!(before, after);
    }

    #[test]
    fn test_large_files_skip_content_hash() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.csv", b"aaaa");
        let keys = KeyGenerator::with_small_file_threshold(2);
        let mtime = UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        set_mtime(&path, mtime);
        let before = keys.generate(&path, None, None);
        write_file(&dir, "a.csv", b"bbbb");
        set_mtime(&path, mtime);
        let after = keys.generate(&path, None, None);

        assert_eq!(before, after);
    }

    #[test]
    fn test_size_changes_key() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.csv", b"aaaa");
        let keys = KeyGenerator::with_small_file_threshold(0);
        let mtime = UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        set_mtime(&path, mtime);
        let before = keys.generate(&path, None, None);
        write_file(&dir, "a.csv", b"aaaaa");
        set_mtime(&path, mtime);
        let after = keys.generate(&path, None, None);

        assert_ne!(before, after);
    }

    #[test]
    fn test_missing_file_gets_stable_key() {
        let keys = KeyGenerator::new();
        let path = Path::new("/nonexistent/data/a.xlsx");

        let key1 = keys.generate(path, Some("A1:B2"), None);
        let key2 = keys.generate(path, Some("A1:B2"), None);

        assert_eq!(key1, key2);
        assert!(!key1.is_error_key());
    }

    #[test]
    fn test_error_key_is_distinct() {
        let key = error_key(Path::new("/data/a.xlsx"));
        assert!(key.is_error_key());
        assert_ne!(key.as_str().len(), KEY_LEN);
    }

    #[test]
    fn test_directory_falls_back_to_error_key() {
        let dir = TempDir::new().unwrap();
        let keys = KeyGenerator::new();

        assert!(keys.try_generate(dir.path(), None, None).is_err());
        assert!(keys.generate(dir.path(), Some("A1:B2"), None).is_error_key());
    }

    #[cfg(unix)]
    #[test]
    fn test_device_files_are_not_read() {
        let keys = KeyGenerator::new();
        for device in ["/dev/zero", "/dev/null"] {
            let path = Path::new(device);
            if path.exists() {
                assert!(keys.generate(path, None, None).is_error_key());
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_falls_back_to_error_key() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "secret.csv", b"a,b");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

        // Root can read anything; only assert when the read actually fails.
        if fs::read(&path).is_err() {
            let keys = KeyGenerator::new();
            assert!(keys.try_generate(&path, None, None).is_err());
            assert!(keys.generate(&path, None, None).is_error_key());
        }

        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
    }
}
