// In-process LRU tier
// Author: kelexine (https://github.com/kelexine)

use super::key::CacheKey;
use super::models::CacheEntry;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Fixed-capacity LRU map of decoded entries.
///
/// The tier has no notion of expiry; callers decide whether an entry is still
/// usable. Entries handed out are clones.
pub struct MemoryTier {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
}

impl MemoryTier {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up `key`, marking it most recently used on a hit.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.lock().get(key).cloned()
    }

    /// Insert or replace `key`, evicting the least recently used entry when full.
    /// Returns the key that was evicted, if any.
    pub fn set(&self, key: CacheKey, entry: CacheEntry) -> Option<CacheKey> {
        match self.entries.lock().push(key.clone(), entry) {
            Some((evicted, _)) if evicted != key => Some(evicted),
            _ => None,
        }
    }

    pub fn remove(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.lock().pop(key)
    }

    /// Drop every entry for which `keep` returns false. Returns the number removed.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&CacheKey, &CacheEntry) -> bool,
    {
        let mut entries = self.entries.lock();
        let doomed: Vec<CacheKey> = entries
            .iter()
            .filter(|(key, entry)| !keep(key, entry))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }
}
