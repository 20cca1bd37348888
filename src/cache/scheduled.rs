use std::time::{Duration, Instant};
use parking_lot::Mutex;
use crate::core::RowSet;
use super::{Cache, CacheKey};

/// Clears the whole delegate once per flush interval.
/// The interval is checked on every operation; nothing runs in the background.
pub struct ScheduledCache {
    delegate: Box<dyn Cache>,
    interval: Duration,
    last_clear: Mutex<Instant>,
}

impl ScheduledCache {
    pub fn new(delegate: Box<dyn Cache>, interval: Duration) -> Self {
        Self {
            delegate,
            interval,
            last_clear: Mutex::new(Instant::now()),
        }
    }

    fn clear_when_stale(&self) -> bool {
        let mut last_clear = self.last_clear.lock();
        if last_clear.elapsed() >= self.interval {
            *last_clear = Instant::now();
            drop(last_clear);
            tracing::debug!(cache = self.id(), "flush interval elapsed, clearing");
            self.delegate.clear();
            true
        } else {
            false
        }
    }
}

impl Cache for ScheduledCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&self, key: CacheKey, value: RowSet) {
        self.clear_when_stale();
        self.delegate.put(key, value);
    }

    fn get(&self, key: &CacheKey) -> Option<RowSet> {
        if self.clear_when_stale() {
            None
        } else {
            self.delegate.get(key)
        }
    }

    fn remove(&self, key: &CacheKey) -> Option<RowSet> {
        self.clear_when_stale();
        self.delegate.remove(key)
    }

    fn clear(&self) {
        *self.last_clear.lock() = Instant::now();
        self.delegate.clear();
    }

    fn size(&self) -> usize {
        self.clear_when_stale();
        self.delegate.size()
    }
}
