use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// In-memory key/value cache where every entry carries its own expiration
/// deadline. Lookups past the deadline behave as misses; expired entries are
/// skipped rather than purged, so memory is reclaimed by overwrites and
/// `clear`, not by a background task.
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
}

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the stored value if a non-expired entry exists. Reading never
    /// extends or resets the deadline.
    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().unwrap();
        entries
            .get(key)
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.value.clone())
    }

    /// Stores `value` under `key` for `ttl`, unconditionally replacing any
    /// prior entry. A zero `ttl` stores an entry that is already expired.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().unwrap().insert(key.into(), entry);
    }

    pub fn delete(&self, key: &str) {
        self.entries.write().unwrap().remove(key);
    }

    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
