use std::collections::VecDeque;
use parking_lot::Mutex;
use crate::core::RowSet;
use super::{Cache, CacheKey};

/// First-in-first-out eviction. Reads never change the eviction order.
pub struct FifoCache {
    delegate: Box<dyn Cache>,
    /// Insertion order, oldest at the front
    queue: Mutex<VecDeque<CacheKey>>,
    capacity: usize,
}

impl FifoCache {
    pub fn new(delegate: Box<dyn Cache>) -> Self {
        Self::with_capacity(delegate, super::lru::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(delegate: Box<dyn Cache>, capacity: usize) -> Self {
        Self {
            delegate,
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity: capacity.max(1),
        }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    fn cycle_key_list(&self, key: CacheKey) -> Option<CacheKey> {
        let mut queue = self.queue.lock();
        // Re-inserting a present key keeps its original position
        if !queue.contains(&key) {
            queue.push_back(key);
        }
        if queue.len() > self.capacity {
            queue.pop_front()
        } else {
            None
        }
    }
}

impl Cache for FifoCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&self, key: CacheKey, value: RowSet) {
        self.delegate.put(key.clone(), value);
        if let Some(oldest) = self.cycle_key_list(key) {
            self.delegate.remove(&oldest);
        }
    }

    fn get(&self, key: &CacheKey) -> Option<RowSet> {
        self.delegate.get(key)
    }

    fn remove(&self, key: &CacheKey) -> Option<RowSet> {
        self.queue.lock().retain(|k| k != key);
        self.delegate.remove(key)
    }

    fn clear(&self) {
        self.delegate.clear();
        self.queue.lock().clear();
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }
}
