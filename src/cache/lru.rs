use linked_hash_map::LinkedHashMap;
use parking_lot::Mutex;
use crate::core::RowSet;
use super::{Cache, CacheKey};

pub const DEFAULT_CAPACITY: usize = 1024;

/// Least-recently-used eviction.
///
/// Keeps an access-ordered list of keys next to the delegate. Reads and
/// writes move a key to the back; when the list grows past `capacity` the
/// front key is dropped from both the list and the delegate.
pub struct LruCache {
    delegate: Box<dyn Cache>,
    /// Front = least recently used
    keys: Mutex<LinkedHashMap<CacheKey, ()>>,
    capacity: usize,
}

impl LruCache {
    pub fn new(delegate: Box<dyn Cache>) -> Self {
        Self::with_capacity(delegate, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(delegate: Box<dyn Cache>, capacity: usize) -> Self {
        Self {
            delegate,
            keys: Mutex::new(LinkedHashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records use of `key` and returns the key to evict, if any
    fn cycle_key_list(&self, key: CacheKey) -> Option<CacheKey> {
        let mut keys = self.keys.lock();
        if keys.get_refresh(&key).is_none() {
            keys.insert(key, ());
        }
        if keys.len() > self.capacity {
            keys.pop_front().map(|(eldest, ())| eldest)
        } else {
            None
        }
    }
}

impl Cache for LruCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&self, key: CacheKey, value: RowSet) {
        self.delegate.put(key.clone(), value);
        if let Some(eldest) = self.cycle_key_list(key) {
            tracing::trace!(cache = self.id(), "evicting least recently used entry");
            self.delegate.remove(&eldest);
        }
    }

    fn get(&self, key: &CacheKey) -> Option<RowSet> {
        self.keys.lock().get_refresh(key);
        self.delegate.get(key)
    }

    fn remove(&self, key: &CacheKey) -> Option<RowSet> {
        self.keys.lock().remove(key);
        self.delegate.remove(key)
    }

    fn clear(&self) {
        self.delegate.clear();
        self.keys.lock().clear();
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }
}
