// Prometheus metrics registry and collectors
// Author: kelexine (https://github.com/kelexine)

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec_with_registry, register_gauge_vec_with_registry, CounterVec, Encoder,
    GaugeVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // LOOKUP METRICS
    // ============================================================================

    /// Cache lookups by serving tier and outcome
    pub static ref CACHE_LOOKUPS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("sheet_cache_lookups_total", "Cache lookups by tier and outcome"),
        &["tier", "outcome"], // tier: memory, disk, none; outcome: hit, miss, expired
        REGISTRY
    ).unwrap();

    // ============================================================================
    // WRITE METRICS
    // ============================================================================

    /// Cache writes per tier
    pub static ref CACHE_WRITES: CounterVec = register_counter_vec_with_registry!(
        Opts::new("sheet_cache_writes_total", "Cache writes by tier and status"),
        &["tier", "status"],
        REGISTRY
    ).unwrap();

    // ============================================================================
    // DISK TIER METRICS
    // ============================================================================

    /// Disk cache files removed, by reason
    pub static ref DISK_REMOVALS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("sheet_cache_disk_removals_total", "Disk cache files removed"),
        &["reason"], // quota, stale, corrupted
        REGISTRY
    ).unwrap();

    /// Bytes used by the disk tier after the last housekeeping pass
    pub static ref DISK_BYTES: GaugeVec = register_gauge_vec_with_registry!(
        Opts::new("sheet_cache_disk_bytes", "Bytes used by disk cache files"),
        &["state"],
        REGISTRY
    ).unwrap();

    /// Entries held by the memory tier
    pub static ref MEMORY_ENTRIES: GaugeVec = register_gauge_vec_with_registry!(
        Opts::new("sheet_cache_memory_entries", "Entries in the memory tier"),
        &["state"],
        REGISTRY
    ).unwrap();
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}
