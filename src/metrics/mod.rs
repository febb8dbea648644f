// Metrics module for Prometheus observability
// Author: kelexine (https://github.com/kelexine)

mod registry;

pub use registry::{
    gather_metrics,
    CACHE_LOOKUPS,
    CACHE_WRITES,
    DISK_BYTES,
    DISK_REMOVALS,
    MEMORY_ENTRIES,
};

/// Helper to record lookups (tier: memory/disk/none)
pub fn record_memory_hit() {
    CACHE_LOOKUPS.with_label_values(&["memory", "hit"]).inc();
}

pub fn record_disk_hit() {
    CACHE_LOOKUPS.with_label_values(&["disk", "hit"]).inc();
}

pub fn record_miss() {
    CACHE_LOOKUPS.with_label_values(&["none", "miss"]).inc();
}

pub fn record_expired(tier: &str) {
    CACHE_LOOKUPS.with_label_values(&[tier, "expired"]).inc();
}

/// Helper to record tier writes
pub fn record_write(tier: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    CACHE_WRITES.with_label_values(&[tier, status]).inc();
}

/// Helper to record disk file removals (reason: quota/stale/corrupted)
pub fn record_disk_removal(reason: &str) {
    DISK_REMOVALS.with_label_values(&[reason]).inc();
}

pub fn update_disk_usage(bytes: u64) {
    DISK_BYTES.with_label_values(&["used"]).set(bytes as f64);
}

pub fn update_memory_entries(count: usize) {
    MEMORY_ENTRIES.with_label_values(&["active"]).set(count as f64);
}
