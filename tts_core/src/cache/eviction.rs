use std::{
    num::NonZeroUsize,
    sync::{Mutex, PoisonError},
};

use lru::LruCache;

use super::CacheKey;

/// Decides which entries leave the cache.
///
/// Keys returned from [`EvictionPolicy::record_insert`] are removed from both
/// tiers by the cache.
pub trait EvictionPolicy: Send + Sync {
    /// Called whenever `key` is served from memory.
    fn record_access(&self, _key: &CacheKey) {}

    /// Called after `key` was admitted to memory. Returns keys to evict.
    fn record_insert(&self, key: &CacheKey) -> Vec<CacheKey>;
}

/// Keep everything forever. Disk usage grows with every distinct request.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unbounded;

impl EvictionPolicy for Unbounded {
    fn record_insert(&self, _key: &CacheKey) -> Vec<CacheKey> {
        Vec::new()
    }
}

/// Keep at most `capacity` entries, dropping the least recently used one.
///
/// Files from earlier runs count once the cache registers them
/// (see `AudioCache::track_existing`).
pub struct MaxEntries {
    order: Mutex<LruCache<CacheKey, ()>>,
}

impl MaxEntries {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            order: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl EvictionPolicy for MaxEntries {
    fn record_access(&self, key: &CacheKey) {
        let mut order = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        order.get(key);
    }

    fn record_insert(&self, key: &CacheKey) -> Vec<CacheKey> {
        let mut order = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        match order.push(key.clone(), ()) {
            // `push` also hands back the old pair when the key was already tracked
            Some((evicted, ())) if evicted != *key => vec![evicted],
            _ => Vec::new(),
        }
    }
}
