//! Content hashing
//!
//! A record's content hash is the change-detection oracle for the sync engine:
//! `hash(current) != last_synced_hash` means that side changed since the last
//! successful sync. The full SHA-256 digest is kept for equality checks; the
//! 16-character short form is only for filenames and log output.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of hex characters in the short (display) form of a hash
pub const SHORT_HASH_LEN: usize = 16;

/// Deterministic digest of a record payload
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Hashes the given bytes
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// Wraps an already computed hex digest (e.g. read back from persisted state)
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into().to_ascii_lowercase())
    }

    /// Returns the full hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the truncated form used for filenames and logs
    pub fn short(&self) -> &str {
        let end = self.0.len().min(SHORT_HASH_LEN);
        &self.0[..end]
    }
}

impl From<String> for ContentHash {
    fn from(hex: String) -> Self {
        Self::from_hex(hex)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short())
    }
}

/// Hashes `bytes`; shorthand for [`ContentHash::of`]
pub fn hash(bytes: &[u8]) -> ContentHash {
    ContentHash::of(bytes)
}
