// Two-tier cache tests - testing only public APIs
// Author: kelexine (https://github.com/kelexine)

use serde_json::json;
use sheet_cache::cache::{CacheConfig, CacheManager};
use sheet_cache::config::CacheSettings;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn workspace() -> (TempDir, PathBuf) {
    let root = TempDir::new().unwrap();
    let data = root.path().join("a.xlsx");
    fs::write(&data, b"PK\x03\x04 pretend workbook").unwrap();
    (root, data)
}

fn manager_in(root: &Path, settings: impl FnOnce(CacheSettings) -> CacheSettings) -> CacheManager {
    let settings = settings(CacheSettings::with_cache_dir(root.join("cache")));
    CacheManager::new(CacheConfig::from_settings(&settings).unwrap()).unwrap()
}

fn touch(path: &Path, offset_secs: u64) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(offset_secs))
        .unwrap();
}

#[test]
fn test_example_scenario() {
    let (root, data) = workspace();
    let cache = manager_in(root.path(), |s| s);

    cache.set(&data, json!({"rows": 10}), Some("A1:B2"), None);

    assert_eq!(cache.get(&data, Some("A1:B2"), None), Some(json!({"rows": 10})));
    assert_eq!(cache.get(&data, Some("A1:B3"), None), None);

    touch(&data, 120);
    assert_eq!(cache.get(&data, Some("A1:B2"), None), None);
}

#[test]
fn test_content_change_invalidates() {
    let (root, data) = workspace();
    let cache = manager_in(root.path(), |s| s);
    cache.set(&data, json!("v1"), None, Some("Sheet1"));

    fs::write(&data, b"PK\x03\x04 edited workbook!!").unwrap();

    assert_eq!(cache.get(&data, None, Some("Sheet1")), None);
}

#[test]
fn test_disk_tier_survives_restart() {
    let (root, data) = workspace();
    {
        let cache = manager_in(root.path(), |s| s);
        cache.set(&data, json!({"html": "<table/>"}), Some("A1:C3"), Some("Data"));
    }

    let cache = manager_in(root.path(), |s| s);
    assert_eq!(
        cache.get(&data, Some("A1:C3"), Some("Data")),
        Some(json!({"html": "<table/>"}))
    );

    let stats = cache.get_stats();
    assert_eq!(stats.counters.disk_hits, 1);
    assert_eq!(stats.memory.unwrap().entries, 1);

    // Promoted: second lookup is served from memory.
    cache.get(&data, Some("A1:C3"), Some("Data"));
    assert_eq!(cache.get_stats().counters.memory_hits, 1);
}

#[test]
fn test_memory_only_mode() {
    let (root, data) = workspace();
    let cache = manager_in(root.path(), |s| CacheSettings {
        disk_cache_enabled: false,
        ..s
    });
    cache.set(&data, json!(42), None, None);

    assert_eq!(cache.get(&data, None, None), Some(json!(42)));
    let stats = cache.get_stats();
    assert!(stats.disk.is_none());
    assert_eq!(stats.memory.unwrap().entries, 1);
}

#[test]
fn test_disk_only_mode() {
    let (root, data) = workspace();
    let cache = manager_in(root.path(), |s| CacheSettings {
        memory_cache_enabled: false,
        ..s
    });
    cache.set(&data, json!(42), None, None);

    assert_eq!(cache.get(&data, None, None), Some(json!(42)));
    assert_eq!(cache.get(&data, None, None), Some(json!(42)));
    let stats = cache.get_stats();
    assert!(stats.memory.is_none());
    assert_eq!(stats.counters.disk_hits, 2);
}

#[test]
fn test_memory_capacity_falls_back_to_disk() {
    let (root, data) = workspace();
    let cache = manager_in(root.path(), |s| CacheSettings { max_entries: 2, ..s });

    for range in ["A1:A1", "A1:A2", "A1:A3"] {
        cache.set(&data, json!(range), Some(range), None);
    }

    // A1:A1 was evicted from memory but is still on disk.
    assert_eq!(cache.get(&data, Some("A1:A1"), None), Some(json!("A1:A1")));
    let stats = cache.get_stats();
    assert_eq!(stats.counters.disk_hits, 1);
    assert_eq!(stats.memory.unwrap().entries, 2);
}

#[test]
fn test_corrupted_disk_entry_is_a_miss() {
    let (root, data) = workspace();
    let cache = manager_in(root.path(), |s| CacheSettings {
        memory_cache_enabled: false,
        ..s
    });
    cache.set(&data, json!(1), None, None);

    let cache_dir = root.path().join("cache");
    let files: Vec<_> = fs::read_dir(&cache_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);
    fs::write(&files[0], b"\xff\xfe garbage").unwrap();

    assert_eq!(cache.get(&data, None, None), None);
    assert!(!files[0].exists());
}

#[test]
fn test_disk_quota_is_respected() {
    let (root, data) = workspace();
    let cache = manager_in(root.path(), |s| CacheSettings {
        max_disk_cache_size_mb: 1,
        memory_cache_enabled: false,
        ..s
    });
    let blob = "z".repeat(300 * 1024);

    for i in 0..8 {
        let range = format!("A1:A{}", i + 1);
        cache.set(&data, json!(blob), Some(&range), None);
        let disk = cache.get_stats().disk.unwrap();
        assert!(disk.total_bytes <= disk.max_bytes);
    }

    let disk = cache.get_stats().disk.unwrap();
    assert!(disk.files >= 1 && disk.files < 8);
}

#[test]
fn test_missing_source_never_hits_disk() {
    let (root, _) = workspace();
    let cache = manager_in(root.path(), |s| CacheSettings {
        memory_cache_enabled: false,
        ..s
    });
    let ghost = root.path().join("ghost.xlsx");

    cache.set(&ghost, json!(1), None, None);

    assert_eq!(cache.get(&ghost, None, None), None);
}

#[test]
fn test_stats_report_configuration() {
    let (root, _) = workspace();
    let cache = manager_in(root.path(), |s| CacheSettings {
        max_entries: 5,
        cache_expiry_seconds: 30,
        ..s
    });

    let stats = cache.get_stats();
    assert_eq!(stats.config.max_entries, 5);
    assert_eq!(stats.config.cache_expiry_seconds, 30);
    assert_eq!(stats.memory.as_ref().unwrap().capacity, 5);
    assert_eq!(stats.disk.as_ref().unwrap().max_bytes, 1024 * 1024 * 1024);

    let rendered = serde_json::to_value(&stats).unwrap();
    assert_eq!(rendered["counters"]["misses"], 0);
}

#[test]
fn test_concurrent_readers_and_writers() {
    let (root, data) = workspace();
    let cache = std::sync::Arc::new(manager_in(root.path(), |s| s));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let cache = std::sync::Arc::clone(&cache);
            let data = data.clone();
            std::thread::spawn(move || {
                for i in 0..20 {
                    let range = format!("A{}:B{}", t, i);
                    cache.set(&data, json!({"t": t, "i": i}), Some(&range), None);
                    assert_eq!(
                        cache.get(&data, Some(&range), None),
                        Some(json!({"t": t, "i": i}))
                    );
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(cache.get_stats().counters.writes, 80);
}
