use dashmap::DashMap;

use super::{CacheKey, CachedAudio};

/// In-process tier. Lookups and inserts never block each other across keys.
#[derive(Debug, Default)]
pub struct MemoryTier {
    entries: DashMap<CacheKey, CachedAudio>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedAudio> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, key: CacheKey, audio: CachedAudio) {
        self.entries.insert(key, audio);
    }

    pub fn remove(&self, key: &CacheKey) -> Option<CachedAudio> {
        self.entries.remove(key).map(|(_, audio)| audio)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
