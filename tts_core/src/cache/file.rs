use std::{
    fs, io,
    path::{Path, PathBuf},
    time::SystemTime,
};

use super::CacheKey;

/// On-disk tier: one `<key>.wav` per entry under `dir`.
#[derive(Debug, Clone)]
pub struct FileTier {
    dir: PathBuf,
}

impl FileTier {
    pub const EXTENSION: &'static str = "wav";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{key}.{}", Self::EXTENSION))
    }

    pub fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    /// `Ok(None)` when no file exists for `key`.
    pub fn read(&self, key: &CacheKey) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write through a temporary file and rename it into place, so readers
    /// (including other processes) only ever see complete files.
    pub fn write(&self, key: &CacheKey, bytes: &[u8]) -> io::Result<()> {
        self.ensure_dir()?;
        let target = self.path_for(key);
        let tmp = self
            .dir
            .join(format!("{key}.{}.{}.tmp", Self::EXTENSION, uuid::Uuid::new_v4()));

        fs::write(&tmp, bytes)?;
        if let Err(e) = fs::rename(&tmp, &target) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        Ok(())
    }

    pub fn remove(&self, key: &CacheKey) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    pub fn exists(&self, key: &CacheKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Entries on disk with their modification time, oldest first.
    /// A missing directory has no entries.
    pub fn list(&self) -> io::Result<Vec<(CacheKey, SystemTime)>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut found = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(Self::EXTENSION) {
                continue;
            }
            let Some(key) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(CacheKey::from_hex)
            else {
                continue;
            };
            let modified = fs::metadata(&path)?.modified()?;
            found.push((key, modified));
        }
        found.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(found)
    }
}
