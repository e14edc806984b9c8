//! Concurrent TTL cache store.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A cached value with its creation time and lifetime.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Arc<str>,
    created: Instant,
    ttl: Duration,
}

impl CacheEntry {
    /// An entry is live while `now < created + ttl`.
    fn is_expired(&self) -> bool {
        self.created.elapsed() >= self.ttl
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads that returned a live entry.
    pub hits: u64,
    /// Reads that found nothing, or only an expired entry.
    pub misses: u64,
    /// Live entries at the time of the snapshot.
    pub key_count: usize,
}

/// Thread-safe key/value store with per-entry expiry.
///
/// All operations touch a single shard of the map, so readers never wait on
/// unrelated keys. Expired entries are dropped lazily by [`CacheStore::get`]
/// and in bulk by [`CacheStore::purge_expired`].
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: DashMap<String, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live entry, counting the outcome as a hit or a miss.
    pub fn get(&self, key: &str) -> Option<Arc<str>> {
        // The shard guard must be released before `remove_if` takes the write lock.
        let lookup = self
            .entries
            .get(key)
            .map(|entry| (!entry.is_expired()).then(|| Arc::clone(&entry.value)));

        let found = match lookup {
            Some(Some(value)) => Some(value),
            Some(None) => {
                self.entries.remove_if(key, |_, entry| entry.is_expired());
                None
            }
            None => None,
        };

        match found {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or replace an entry.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Arc<str>>, ttl: Duration) {
        let entry = CacheEntry { value: value.into(), created: Instant::now(), ttl };
        self.entries.insert(key.into(), entry);
    }

    /// Remove an entry. Returns whether a live entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired())
    }

    /// Drop every entry. Counters are left untouched.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Counter snapshot.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            key_count: self.entries.iter().filter(|e| !e.value().is_expired()).count(),
        }
    }

    /// Keys of all live entries, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| !e.value().is_expired())
            .map(|e| e.key().clone())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Approximate bytes held by live values.
    pub fn approximate_bytes(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !e.value().is_expired())
            .map(|e| e.key().len() + e.value().value.len())
            .sum()
    }

    /// Evict all expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "purged expired cache entries");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    fn insert_expired(store: &CacheStore, key: &str) {
        let created = Instant::now()
            .checked_sub(Duration::from_secs(2))
            .unwrap_or_else(Instant::now);
        store
            .entries
            .insert(key.to_string(), CacheEntry { value: Arc::from("stale"), created, ttl: Duration::from_secs(1) });
    }

    #[test]
    fn test_get_miss_then_hit() {
        let store = CacheStore::new();
        assert!(store.get("k").is_none());

        store.set("k", "<p>hi</p>", TTL);
        assert_eq!(store.get("k").as_deref(), Some("<p>hi</p>"));

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.key_count, 1);
    }

    #[test]
    fn test_set_replaces_value() {
        let store = CacheStore::new();
        store.set("k", "one", TTL);
        store.set("k", "two", TTL);
        assert_eq!(store.get("k").as_deref(), Some("two"));
        assert_eq!(store.stats().key_count, 1);
    }

    #[test]
    fn test_expired_entry_is_a_miss_and_evicted() {
        let store = CacheStore::new();
        insert_expired(&store, "old");

        assert!(store.get("old").is_none());
        assert_eq!(store.stats().misses, 1);
        assert!(store.entries.is_empty());
    }

    #[test]
    fn test_zero_ttl_is_never_visible() {
        let store = CacheStore::new();
        store.set("k", "v", Duration::ZERO);
        assert!(store.get("k").is_none());
    }

    #[test]
    fn test_expired_entries_not_counted() {
        let store = CacheStore::new();
        insert_expired(&store, "old");
        store.set("fresh", "v", TTL);

        assert_eq!(store.stats().key_count, 1);
        assert_eq!(store.keys(), vec!["fresh".to_string()]);
    }

    #[test]
    fn test_delete() {
        let store = CacheStore::new();
        store.set("k", "v", TTL);
        assert!(store.delete("k"));
        assert!(!store.delete("k"));
        assert!(store.get("k").is_none());
    }

    #[test]
    fn test_clear_keeps_counters() {
        let store = CacheStore::new();
        store.set("a", "1", TTL);
        store.set("b", "2", TTL);
        store.get("a");
        store.get("missing");

        store.clear();

        let stats = store.stats();
        assert_eq!(stats.key_count, 0);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_purge_expired() {
        let store = CacheStore::new();
        insert_expired(&store, "old1");
        insert_expired(&store, "old2");
        store.set("fresh", "v", TTL);

        assert_eq!(store.purge_expired(), 2);
        assert_eq!(store.entries.len(), 1);
        assert_eq!(store.purge_expired(), 0);
    }

    #[test]
    fn test_approximate_bytes() {
        let store = CacheStore::new();
        store.set("ab", "1234", TTL);
        assert_eq!(store.approximate_bytes(), 6);
    }

    #[test]
    fn test_concurrent_access() {
        let store = Arc::new(CacheStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..100 {
                        let key = format!("k{}", (i * 100 + j) % 50);
                        store.set(key.clone(), "v", TTL);
                        store.get(&key);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let stats = store.stats();
        assert_eq!(stats.hits + stats.misses, 800);
        assert_eq!(stats.key_count, 50);
    }
}
