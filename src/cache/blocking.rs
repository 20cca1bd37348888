/// Per-key single-flight cache.
///
/// A `get` that misses leaves the key locked: the caller is expected to
/// compute the value and `put` it (or `remove` the key to give up), which
/// releases every thread waiting on that key. Hits release immediately.
/// Threads working on different keys never wait on each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;
use parking_lot::{Condvar, Mutex};
use crate::core::RowSet;
use super::{Cache, CacheKey};

struct Latch {
    owner: ThreadId,
    released: Mutex<bool>,
    cond: Condvar,
}

impl Latch {
    fn new() -> Self {
        Self {
            owner: thread::current().id(),
            released: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Waits for release; false if the timeout elapsed first
    fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut released = self.released.lock();
        while !*released {
            match timeout {
                None => self.cond.wait(&mut released),
                Some(t) => {
                    if self.cond.wait_for(&mut released, t).timed_out() {
                        return *released;
                    }
                }
            }
        }
        true
    }

    fn release(&self) {
        *self.released.lock() = true;
        self.cond.notify_all();
    }
}

pub struct BlockingCache {
    delegate: Box<dyn Cache>,
    locks: Mutex<HashMap<CacheKey, Arc<Latch>>>,
    timeout: Option<Duration>,
}

impl BlockingCache {
    pub fn new(delegate: Box<dyn Cache>) -> Self {
        Self {
            delegate,
            locks: Mutex::new(HashMap::new()),
            timeout: None,
        }
    }

    /// Waiting longer than `timeout` for a key is treated as fatal
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Number of keys currently locked by a filling caller
    pub fn locked_keys(&self) -> usize {
        self.locks.lock().len()
    }

    fn acquire_lock(&self, key: &CacheKey) {
        let current = thread::current().id();
        loop {
            let latch = {
                let mut locks = self.locks.lock();
                match locks.get(key) {
                    None => {
                        locks.insert(key.clone(), Arc::new(Latch::new()));
                        return;
                    }
                    // The filling thread itself may read the key again
                    Some(existing) if existing.owner == current => return,
                    Some(existing) => Arc::clone(existing),
                }
            };
            if !latch.wait(self.timeout) {
                panic!(
                    "could not acquire lock for key {key} in cache '{}' within {:?}",
                    self.id(),
                    self.timeout.unwrap_or_default()
                );
            }
        }
    }

    fn release_lock(&self, key: &CacheKey) {
        let latch = self.locks.lock().remove(key);
        if let Some(latch) = latch {
            latch.release();
        }
    }
}

impl Cache for BlockingCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&self, key: CacheKey, value: RowSet) {
        self.delegate.put(key.clone(), value);
        self.release_lock(&key);
    }

    fn get(&self, key: &CacheKey) -> Option<RowSet> {
        self.acquire_lock(key);
        let value = self.delegate.get(key);
        if value.is_some() {
            self.release_lock(key);
        }
        value
    }

    fn remove(&self, key: &CacheKey) -> Option<RowSet> {
        let removed = self.delegate.remove(key);
        self.release_lock(key);
        removed
    }

    fn clear(&self) {
        self.delegate.clear();
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }
}
