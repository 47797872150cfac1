/// Bounded in-memory cache
///
/// Parsed documents (translation catalogs, for example) are kept in an
/// explicitly owned cache with a fixed capacity instead of module-level
/// statics, so two owners never share entries by accident.
use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;

/// LRU cache holding at most `capacity` entries
#[derive(Debug)]
pub struct BoundedCache<K: Hash + Eq, V> {
    inner: LruCache<K, V>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash,
{
    /// A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(cap),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains(key)
    }

    /// Look up an entry and mark it as most recently used
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    /// Look up an entry without changing eviction order
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.inner.peek(key)
    }

    /// Insert or replace an entry, evicting the least recently used one when full.
    /// Returns the evicted key, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<K> {
        // `push` hands back the old pair on replacement; that is not an eviction
        let replacing = self.inner.contains(&key);
        let popped = self.inner.push(key, value);
        if replacing {
            return None;
        }
        popped.map(|(evicted, _)| evicted)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.inner.pop(key)
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}
