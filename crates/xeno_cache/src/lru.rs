//! A small bounded least-recently-used map.

use std::hash::Hash;

use indexmap::IndexMap;

/// A map holding at most `capacity` entries, evicting the least recently used.
///
/// Entries are kept in recency order inside an [`IndexMap`]: the front is the
/// next to be evicted, the back the most recently touched.
#[derive(Debug, Clone)]
pub struct LruCache<K, V> {
    entries: IndexMap<K, V>,
    capacity: usize,
}

impl<K: Hash + Eq, V> LruCache<K, V> {
    /// An empty cache. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: IndexMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` is cached, without touching its recency.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the value for `key` and marks it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let index = self.entries.get_index_of(key)?;
        let last = self.entries.len() - 1;
        self.entries.move_index(index, last);
        self.entries.get_index(last).map(|(_, v)| v)
    }

    /// Inserts or replaces `key`, marking it most recently used.
    ///
    /// Returns the evicted entry when the insert pushed the cache over
    /// capacity.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        let (index, _) = self.entries.insert_full(key, value);
        let last = self.entries.len() - 1;
        self.entries.move_index(index, last);
        if self.entries.len() > self.capacity {
            self.entries.shift_remove_index(0)
        } else {
            None
        }
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_inserted() {
        let mut cache = LruCache::new(2);
        assert!(cache.insert("a", 1).is_none());
        assert!(cache.insert("b", 2).is_none());
        assert_eq!(cache.insert("c", 3), Some(("a", 1)));
        assert!(!cache.contains(&"a"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn get_refreshes_recency() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.insert("c", 3), Some(("b", 2)));
        assert!(cache.contains(&"a"));
    }

    #[test]
    fn reinsert_replaces_without_eviction() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert!(cache.insert("a", 10).is_none());
        assert_eq!(cache.get(&"a"), Some(&10));
        // "b" is now the oldest
        assert_eq!(cache.insert("c", 3), Some(("b", 2)));
    }

    #[test]
    fn miss_returns_none() {
        let mut cache: LruCache<&str, i32> = LruCache::new(4);
        assert!(cache.get(&"missing").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut cache = LruCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert(1, "one");
        assert_eq!(cache.insert(2, "two"), Some((1, "one")));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
