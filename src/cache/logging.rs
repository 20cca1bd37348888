use std::sync::atomic::{AtomicU64, Ordering};
use crate::core::RowSet;
use super::{Cache, CacheKey};

/// Counts lookups and hits and reports the running hit ratio
pub struct LoggingCache {
    delegate: Box<dyn Cache>,
    requests: AtomicU64,
    hits: AtomicU64,
}

impl LoggingCache {
    pub fn new(delegate: Box<dyn Cache>) -> Self {
        Self {
            delegate,
            requests: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn hit_ratio(&self) -> f64 {
        let requests = self.requests();
        if requests == 0 {
            0.0
        } else {
            self.hits() as f64 / requests as f64
        }
    }
}

impl Cache for LoggingCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&self, key: CacheKey, value: RowSet) {
        self.delegate.put(key, value);
    }

    fn get(&self, key: &CacheKey) -> Option<RowSet> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let value = self.delegate.get(key);
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        tracing::debug!(cache = self.id(), hit_ratio = self.hit_ratio(), "Cache Hit Ratio");
        value
    }

    fn remove(&self, key: &CacheKey) -> Option<RowSet> {
        self.delegate.remove(key)
    }

    fn clear(&self) {
        self.delegate.clear();
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }
}
