//! Bounded key-value cache with least-recently-used eviction.
//!
//! [`EvictionCache`] is a thin layer over [`lru::LruCache`] with the semantics block caches rely
//! on. Evicting an absent key is a no-op, inserting reports the entry that was displaced to make
//! room (but not the value that was overwritten), and lookups come in two flavors: [`get`]
//! refreshes recency, [`peek`] and [`contains`] leave it alone.
//!
//! [`get`]:      EvictionCache::get
//! [`peek`]:     EvictionCache::peek
//! [`contains`]: EvictionCache::contains

use core::{
    borrow::Borrow,
    fmt::{Debug, Formatter, Result as FmtResult},
    hash::Hash,
    num::NonZeroUsize,
};

use lru::LruCache;

pub struct EvictionCache<K: Hash + Eq, V> {
    entries: LruCache<K, V>,
}

impl<K: Hash + Eq, V> EvictionCache<K, V> {
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    #[must_use]
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.peek(key)
    }

    #[must_use]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains(key)
    }

    /// Inserts or overwrites `key` and marks it most recently used.
    ///
    /// Returns the least recently used entry if one had to be evicted to stay within capacity.
    /// Overwriting an existing key never evicts anything and returns [`None`].
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        let overwrites = self.entries.contains(&key);
        let displaced = self.entries.push(key, value);

        if overwrites {
            return None;
        }

        displaced
    }

    /// Removes `key` unconditionally. Absent keys are ignored.
    pub fn evict<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.pop(key)
    }

    pub fn flush(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> NonZeroUsize {
        self.entries.cap()
    }

    /// Iterates from the most recently used entry to the least recently used one.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(key, _)| key)
    }
}

impl<K: Hash + Eq + Debug, V> Debug for EvictionCache<K, V> {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        formatter
            .debug_struct("EvictionCache")
            .field("capacity", &self.capacity())
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}
