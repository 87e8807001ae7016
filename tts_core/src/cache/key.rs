use std::fmt;

use sha2::{Digest, Sha256};

use crate::rate::SpeechRate;

/// Identifier of a synthesized clip: lowercase hex SHA-256, always 64 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub const LEN: usize = 64;

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Accept a previously derived key, e.g. a cache file stem.
    pub fn from_hex(s: &str) -> Option<Self> {
        let valid = s.len() == Self::LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(s.to_string()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the cache key for `(text, rate, model_id)`.
///
/// Each field is hashed with a length prefix, so `("ab", "c")`-style shifts
/// between fields never produce the same preimage. The rate uses the shortest
/// round-trip float rendering, which is stable across processes.
pub fn derive_key(text: &str, rate: SpeechRate, model_id: &str) -> CacheKey {
    let rate = rate.to_string();

    let mut hasher = Sha256::new();
    for field in [text, rate.as_str(), model_id] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    CacheKey(hex::encode(hasher.finalize()))
}
