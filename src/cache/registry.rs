// Process-wide cache manager registry
// Author: kelexine (https://github.com/kelexine)
//
// Applications should construct a CacheManager at startup and pass it down.
// The registry exists for collaborators that cannot be handed one and need a
// shared default instance.

use crate::cache::manager::CacheManager;
use crate::cache::models::CacheConfig;
use crate::error::Result;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info};

/// Global registry used by the free functions in this module
static GLOBAL_REGISTRY: Lazy<ProcessRegistry> = Lazy::new(ProcessRegistry::new);

/// Lifecycle of the shared instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Uninitialized,
    Initializing,
    Ready,
}

/// Lazily constructs one shared [`CacheManager`].
///
/// The first caller builds the manager while holding `init_lock`; concurrent
/// first callers block on the lock and then observe the finished instance.
pub struct ProcessRegistry {
    /// Configuration for the next construction. `None` means platform defaults.
    config: RwLock<Option<CacheConfig>>,
    instance: RwLock<Option<Arc<CacheManager>>>,
    init_lock: Mutex<()>,
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self {
            config: RwLock::new(None),
            instance: RwLock::new(None),
            init_lock: Mutex::new(()),
        }
    }

    /// Registry seeded with `config` instead of platform defaults.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            config: RwLock::new(Some(config)),
            ..Self::new()
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static ProcessRegistry {
        &GLOBAL_REGISTRY
    }

    /// Return the shared manager, constructing it on first use.
    ///
    /// # Errors
    ///
    /// Configuration errors from constructing the manager. The registry stays
    /// `Uninitialized` so a later call can retry.
    pub fn get(&self) -> Result<Arc<CacheManager>> {
        // Fast path: already constructed.
        if let Some(manager) = self.instance.read().as_ref() {
            return Ok(Arc::clone(manager));
        }

        let _guard = self.init_lock.lock();

        // Re-check after gaining the lock.
        if let Some(manager) = self.instance.read().as_ref() {
            debug!("Cache manager initialized by another caller");
            return Ok(Arc::clone(manager));
        }

        let config = match self.config.read().clone() {
            Some(config) => config,
            None => CacheConfig::load_default()?,
        };
        let manager = Arc::new(CacheManager::new(config)?);
        *self.instance.write() = Some(Arc::clone(&manager));
        info!("Shared cache manager ready");
        Ok(manager)
    }

    pub fn state(&self) -> RegistryState {
        if self.instance.read().is_some() {
            RegistryState::Ready
        } else if self.init_lock.is_locked() {
            RegistryState::Initializing
        } else {
            RegistryState::Uninitialized
        }
    }

    /// Install a new configuration. The current instance, if any, is dropped
    /// without touching its storage; the next `get` builds a fresh manager.
    pub fn configure(&self, config: CacheConfig) {
        let _guard = self.init_lock.lock();
        *self.config.write() = Some(config);
        *self.instance.write() = None;
        debug!("Cache configuration replaced");
    }

    /// Clear the current instance's tiers and return to `Uninitialized`.
    pub fn reset(&self) {
        let _guard = self.init_lock.lock();
        if let Some(manager) = self.instance.write().take() {
            manager.clear();
            info!("Shared cache manager reset");
        }
    }
}

/// Shared manager from the process-wide registry.
pub fn get_cache_manager() -> Result<Arc<CacheManager>> {
    ProcessRegistry::global().get()
}

/// Reset the process-wide registry.
pub fn reset_cache_manager() {
    ProcessRegistry::global().reset()
}

/// Replace the configuration used by the process-wide registry.
pub fn set_cache_config(config: CacheConfig) {
    ProcessRegistry::global().configure(config)
}
