//! In-memory index of crop keys known to exist.
//!
//! Cached crops are immutable once written, so a positive existence answer
//! can be remembered and reused without asking the crops disk again. Only
//! positive answers are stored; a miss always goes to the disk.

use std::num::NonZeroUsize;

use lru::LruCache;
use tokio::sync::RwLock;

/// Default number of crop keys to remember.
pub const DEFAULT_KNOWN_CROPS_CAPACITY: usize = 10_000;

/// LRU set of crop keys that exist on the crops disk.
pub struct KnownCrops {
    keys: RwLock<LruCache<String, ()>>,
}

impl KnownCrops {
    /// Create an index with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_KNOWN_CROPS_CAPACITY)
    }

    /// Create an index holding at most `capacity` keys (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            keys: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// Whether `key` is known to exist. Marks the key as recently used.
    pub async fn contains(&self, key: &str) -> bool {
        let mut keys = self.keys.write().await;
        keys.get(key).is_some()
    }

    /// Remember that `key` exists.
    pub async fn insert(&self, key: &str) {
        let mut keys = self.keys.write().await;
        keys.put(key.to_string(), ());
    }

    /// Forget `key`, e.g. after it was deleted.
    pub async fn remove(&self, key: &str) {
        let mut keys = self.keys.write().await;
        keys.pop(key);
    }

    /// Forget every key.
    pub async fn clear(&self) {
        self.keys.write().await.clear();
    }

    /// Number of remembered keys.
    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    /// Whether no keys are remembered.
    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }
}

impl Default for KnownCrops {
    fn default() -> Self {
        Self::new()
    }
}
