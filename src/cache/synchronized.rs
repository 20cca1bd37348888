use parking_lot::Mutex;
use crate::core::RowSet;
use super::{Cache, CacheKey};

/// Serializes every operation on the wrapped stack behind one lock
pub struct SynchronizedCache {
    delegate: Box<dyn Cache>,
    lock: Mutex<()>,
}

impl SynchronizedCache {
    pub fn new(delegate: Box<dyn Cache>) -> Self {
        Self {
            delegate,
            lock: Mutex::new(()),
        }
    }
}

impl Cache for SynchronizedCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&self, key: CacheKey, value: RowSet) {
        let _guard = self.lock.lock();
        self.delegate.put(key, value);
    }

    fn get(&self, key: &CacheKey) -> Option<RowSet> {
        let _guard = self.lock.lock();
        self.delegate.get(key)
    }

    fn remove(&self, key: &CacheKey) -> Option<RowSet> {
        let _guard = self.lock.lock();
        self.delegate.remove(key)
    }

    fn clear(&self) {
        let _guard = self.lock.lock();
        self.delegate.clear();
    }

    fn size(&self) -> usize {
        let _guard = self.lock.lock();
        self.delegate.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::{key, rows};
    use crate::cache::{LruCache, PerpetualCache};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_concurrent_lru_stays_within_capacity() {
        let cache = Arc::new(SynchronizedCache::new(Box::new(LruCache::with_capacity(
            Box::new(PerpetualCache::new("sync")),
            8,
        ))));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..100 {
                        let k = key(&format!("{t}-{i}"));
                        cache.put(k.clone(), rows(i));
                        cache.get(&k);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.size(), 8);
    }
}
