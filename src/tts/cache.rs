//! In-memory synthesized-audio cache shared by every speech path.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Cache key for plain text spoken by `voice`.
pub fn key_for_text(text: &str, voice: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"text\0");
    hasher.update(voice.as_bytes());
    hasher.update(b"\0");
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Cache key for a complete SSML document.
pub fn key_for_ssml(ssml: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"ssml\0");
    hasher.update(ssml.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found audio.
    pub hits: u64,
    /// Lookups that did not.
    pub misses: u64,
    /// Stored entries.
    pub entries: usize,
}

/// Process-wide audio cache.
///
/// Entries are inserted once and never replaced; the only removal is
/// [`AudioCache::clear`]. Growth is unbounded for the cache's lifetime.
#[derive(Debug, Default)]
pub struct AudioCache {
    entries: Mutex<HashMap<String, Bytes>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AudioCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached audio for `key`.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let found = self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Store `audio` unless `key` is present; returns the stored audio.
    pub fn insert(&self, key: String, audio: Bytes) -> Bytes {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let stored = entries.entry(key).or_insert(audio).clone();
        debug!(entries = entries.len(), bytes = stored.len(), "audio cached");
        stored
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let dropped = entries.len();
        entries.clear();
        debug!(dropped, "audio cache cleared");
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
