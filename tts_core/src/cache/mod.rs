//! Two-tier cache of synthesized audio: memory first, then one file per key.
//!
//! An entry is either present in both tiers with the same bytes or absent
//! from both. `put` writes the file before touching memory, so a failed disk
//! write leaves nothing behind. Disk writes, evictions and file-hit
//! promotions take one lock so an eviction never interleaves with a write of
//! the same key.

mod eviction;
mod file;
mod key;
mod memory;

use std::{
    fmt, io,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use thiserror::Error;
use tracing::{debug, info, warn};

pub use eviction::{EvictionPolicy, MaxEntries, Unbounded};
pub use file::FileTier;
pub use key::{derive_key, CacheKey};
pub use memory::MemoryTier;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write cache entry {key}: {source}")]
    Write {
        key: CacheKey,
        #[source]
        source: io::Error,
    },
}

/// Immutable WAV bytes, cheap to clone.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedAudio(Arc<[u8]>);

impl CachedAudio {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for CachedAudio {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

impl AsRef<[u8]> for CachedAudio {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for CachedAudio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedAudio")
            .field("len", &self.0.len())
            .finish()
    }
}

pub struct AudioCache {
    memory: MemoryTier,
    files: FileTier,
    policy: Box<dyn EvictionPolicy>,
    writes: Mutex<()>,
}

impl AudioCache {
    /// Unbounded cache rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_policy(dir, Box::new(Unbounded))
    }

    pub fn with_policy(dir: impl Into<PathBuf>, policy: Box<dyn EvictionPolicy>) -> Self {
        Self {
            memory: MemoryTier::new(),
            files: FileTier::new(dir),
            policy,
            writes: Mutex::new(()),
        }
    }

    /// `None` means unbounded. A bounded cache starts by tracking the files
    /// already on disk, oldest first, and trims them to the limit.
    pub fn with_max_entries(dir: impl Into<PathBuf>, max_entries: Option<NonZeroUsize>) -> Self {
        match max_entries {
            Some(capacity) => {
                let cache = Self::with_policy(dir, Box::new(MaxEntries::new(capacity)));
                cache.track_existing();
                cache
            }
            None => Self::new(dir),
        }
    }

    /// Register files left by earlier runs with the eviction policy.
    pub fn track_existing(&self) {
        let existing = match self.files.list() {
            Ok(existing) => existing,
            Err(e) => {
                warn!("Failed to scan cache directory {}: {e}", self.files.dir().display());
                return;
            }
        };
        if existing.is_empty() {
            return;
        }

        let _writes = self.lock_writes();
        let found = existing.len();
        for (key, _) in existing {
            self.admit(&key);
        }
        info!(found, "Tracking existing cache files in {}", self.files.dir().display());
    }

    pub fn cache_dir(&self) -> &Path {
        self.files.dir()
    }

    pub fn ensure_dir(&self) -> Result<(), CacheError> {
        self.files.ensure_dir().map_err(|source| CacheError::CreateDir {
            path: self.files.dir().to_path_buf(),
            source,
        })
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedAudio> {
        if let Some(audio) = self.memory.get(key) {
            debug!(%key, "Memory cache hit");
            self.policy.record_access(key);
            return Some(audio);
        }

        match self.files.read(key) {
            Ok(Some(bytes)) => {
                debug!(%key, "File cache hit");
                let audio = CachedAudio::from(bytes);
                let _writes = self.lock_writes();
                // evicted between the read and the lock: serve it, keep it out of memory
                if self.files.exists(key) {
                    self.memory.insert(key.clone(), audio.clone());
                    self.admit(key);
                }
                Some(audio)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(%key, "Unreadable cache file, treating as miss: {e}");
                None
            }
        }
    }

    pub fn put(&self, key: &CacheKey, bytes: Vec<u8>) -> Result<CachedAudio, CacheError> {
        let _writes = self.lock_writes();
        self.files
            .write(key, &bytes)
            .map_err(|source| CacheError::Write {
                key: key.clone(),
                source,
            })?;

        let audio = CachedAudio::from(bytes);
        self.memory.insert(key.clone(), audio.clone());
        self.admit(key);
        Ok(audio)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.memory.contains(key) || self.files.exists(key)
    }

    /// Entries currently held in memory.
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Caller holds the write lock.
    fn admit(&self, key: &CacheKey) {
        for evicted in self.policy.record_insert(key) {
            debug!(key = %evicted, "Evicting cache entry");
            self.memory.remove(&evicted);
            if let Err(e) = self.files.remove(&evicted) {
                warn!(key = %evicted, "Failed to remove evicted cache file: {e}");
            }
        }
    }
}

impl fmt::Debug for AudioCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioCache")
            .field("dir", &self.files.dir())
            .field("entries", &self.memory.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rate::SpeechRate, wav};

    fn key(text: &str) -> CacheKey {
        derive_key(text, SpeechRate::default(), "test-model")
    }

    fn clip(seed: f32) -> Vec<u8> {
        wav::encode_wav(&[seed, -seed, seed / 2.0], 22_050).unwrap()
    }

    #[test]
    fn test_get_on_empty_cache_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::new(dir.path());
        assert!(cache.get(&key("missing")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_writes_file_and_memory_with_same_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::new(dir.path().join("nested"));
        let k = key("hello");

        let stored = cache.put(&k, clip(0.25)).unwrap();

        let on_disk = std::fs::read(dir.path().join("nested").join(format!("{k}.wav"))).unwrap();
        let in_memory = cache.memory.get(&k).unwrap();
        assert_eq!(on_disk, in_memory.as_bytes());
        assert_eq!(stored, in_memory);
        assert_eq!(
            wav::decode_wav(&on_disk).unwrap(),
            wav::decode_wav(in_memory.as_bytes()).unwrap()
        );
    }

    #[test]
    fn test_file_tier_survives_a_new_cache_instance() {
        let dir = tempfile::tempdir().unwrap();
        let k = key("persisted");
        let bytes = clip(0.5);
        AudioCache::new(dir.path()).put(&k, bytes.clone()).unwrap();

        let fresh = AudioCache::new(dir.path());
        assert_eq!(fresh.len(), 0);
        let audio = fresh.get(&k).unwrap();
        assert_eq!(audio.as_bytes(), bytes.as_slice());
        // file hit populates memory
        assert_eq!(fresh.len(), 1);
    }

    #[test]
    fn test_failed_file_write_caches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        // a regular file where the cache directory should be
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let cache = AudioCache::new(&blocker);
        let k = key("doomed");
        assert!(matches!(
            cache.put(&k, clip(0.1)),
            Err(CacheError::Write { .. })
        ));
        assert!(cache.get(&k).is_none());
        assert!(!cache.contains(&k));
    }

    #[test]
    fn test_put_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::new(dir.path());
        cache.put(&key("a"), clip(0.1)).unwrap();
        cache.put(&key("a"), clip(0.2)).unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{}.wav", key("a"))]);
    }

    #[test]
    fn test_max_entries_evicts_from_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::with_max_entries(dir.path(), NonZeroUsize::new(1));

        cache.put(&key("first"), clip(0.1)).unwrap();
        cache.put(&key("second"), clip(0.2)).unwrap();

        assert!(!cache.contains(&key("first")));
        assert!(!dir.path().join(format!("{}.wav", key("first"))).exists());
        assert!(cache.contains(&key("second")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_unreadable_cache_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::new(dir.path());
        let k = key("unreadable");
        // a directory where the file should be makes the read fail
        std::fs::create_dir_all(dir.path().join(format!("{k}.wav"))).unwrap();

        assert!(cache.get(&k).is_none());
        assert!(cache.is_empty());
        assert!(!cache.contains(&k));
    }

    #[test]
    fn test_bounded_cache_counts_files_from_earlier_runs() {
        let dir = tempfile::tempdir().unwrap();
        let earlier = AudioCache::new(dir.path());
        for text in ["one", "two", "three"] {
            earlier.put(&key(text), clip(0.1)).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let cache = AudioCache::with_max_entries(dir.path(), NonZeroUsize::new(2));
        let wav_files = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref().unwrap().path().extension().and_then(|x| x.to_str()) == Some("wav")
            })
            .count();
        assert_eq!(wav_files, 2);
        assert!(dir.path().join("notes.txt").exists());

        cache.put(&key("four"), clip(0.4)).unwrap();
        let remaining = ["one", "two", "three", "four"]
            .iter()
            .filter(|text| cache.contains(&key(text)))
            .count();
        assert_eq!(remaining, 2);
        assert!(cache.contains(&key("four")));
    }

    #[test]
    fn test_concurrent_puts_keep_tiers_consistent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::with_max_entries(dir.path(), NonZeroUsize::new(3));
        let keys: Vec<CacheKey> = (0..6).map(|i| key(&format!("line {i}"))).collect();

        std::thread::scope(|s| {
            for t in 0..4 {
                let (cache, keys) = (&cache, &keys);
                s.spawn(move || {
                    for round in 0..10 {
                        let k = &keys[(t + round) % keys.len()];
                        cache.put(k, clip(0.1)).unwrap();
                        let _ = cache.get(k);
                    }
                });
            }
        });

        for k in &keys {
            assert_eq!(cache.memory.contains(k), cache.files.exists(k), "key {k}");
        }
        assert!(cache.len() <= 3);
    }
}
