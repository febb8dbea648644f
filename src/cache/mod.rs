// Cache management module
// Author: kelexine (https://github.com/kelexine)

pub mod disk;
pub mod key;
pub mod manager;
pub mod memory;
pub mod models;
pub mod registry;

pub use disk::DiskTier;
pub use key::{CacheKey, KeyGenerator, SMALL_FILE_THRESHOLD};
pub use manager::CacheManager;
pub use memory::MemoryTier;
pub use models::{
    CacheConfig, CacheCounters, CacheEntry, CacheStats, DiskFormat, DiskStats,
    HousekeepingReport, MemoryStats, OptimizeReport,
};
pub use registry::{
    get_cache_manager, reset_cache_manager, set_cache_config, ProcessRegistry, RegistryState,
};
