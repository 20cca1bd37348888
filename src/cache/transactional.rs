/// Transaction-scoped view of a shared cache.
///
/// Writes are staged in a private overlay and only reach the shared cache on
/// `commit`; `rollback` drops them. Keys that missed are remembered so a
/// blocking delegate can be unlocked whichever way the transaction ends.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use linked_hash_map::LinkedHashMap;
use parking_lot::Mutex;
use crate::core::RowSet;
use super::{Cache, CacheKey};

#[derive(Default)]
struct Overlay {
    clear_on_commit: bool,
    /// Staged puts in arrival order
    to_add: LinkedHashMap<CacheKey, RowSet>,
    missed: HashSet<CacheKey>,
}

pub struct TransactionalCache {
    delegate: Arc<dyn Cache>,
    overlay: Mutex<Overlay>,
}

impl TransactionalCache {
    pub fn new(delegate: Arc<dyn Cache>) -> Self {
        Self {
            delegate,
            overlay: Mutex::new(Overlay::default()),
        }
    }

    /// Publishes the overlay to the shared cache
    pub fn commit(&self) {
        let overlay = std::mem::take(&mut *self.overlay.lock());
        if overlay.clear_on_commit {
            self.delegate.clear();
        }
        for (key, value) in overlay.to_add.iter() {
            self.delegate.put(key.clone(), value.clone());
        }
        for key in overlay.missed.iter().filter(|k| !overlay.to_add.contains_key(*k)) {
            self.delegate.remove(key);
        }
    }

    /// Drops the overlay; the shared cache is left as it was
    pub fn rollback(&self) {
        let overlay = std::mem::take(&mut *self.overlay.lock());
        for key in &overlay.missed {
            self.delegate.remove(key);
        }
    }

    /// Forgets a miss whose fill failed and unlocks it in the shared cache
    pub fn release(&self, key: &CacheKey) {
        let was_missed = self.overlay.lock().missed.remove(key);
        if was_missed {
            self.delegate.remove(key);
        }
    }

    pub fn pending(&self) -> usize {
        self.overlay.lock().to_add.len()
    }
}

impl Cache for TransactionalCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&self, key: CacheKey, value: RowSet) {
        self.overlay.lock().to_add.insert(key, value);
    }

    fn get(&self, key: &CacheKey) -> Option<RowSet> {
        {
            let overlay = self.overlay.lock();
            if let Some(staged) = overlay.to_add.get(key) {
                return Some(staged.clone());
            }
            if overlay.clear_on_commit {
                return None;
            }
        }
        let value = self.delegate.get(key);
        if value.is_none() {
            self.overlay.lock().missed.insert(key.clone());
        }
        value
    }

    fn remove(&self, key: &CacheKey) -> Option<RowSet> {
        self.overlay.lock().to_add.remove(key)
    }

    /// Hides the shared contents for the rest of the transaction and clears them on commit
    fn clear(&self) {
        let mut overlay = self.overlay.lock();
        overlay.clear_on_commit = true;
        overlay.to_add.clear();
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }
}

/// One `TransactionalCache` per shared cache touched by a session
#[derive(Default)]
pub struct TransactionalCacheManager {
    caches: HashMap<usize, TransactionalCache>,
}

impl TransactionalCacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(cache: &Arc<dyn Cache>) -> usize {
        Arc::as_ptr(cache).cast::<()>() as usize
    }

    fn transactional(&mut self, cache: &Arc<dyn Cache>) -> &TransactionalCache {
        self.caches
            .entry(Self::slot(cache))
            .or_insert_with(|| TransactionalCache::new(Arc::clone(cache)))
    }

    pub fn get(&mut self, cache: &Arc<dyn Cache>, key: &CacheKey) -> Option<RowSet> {
        self.transactional(cache).get(key)
    }

    pub fn put(&mut self, cache: &Arc<dyn Cache>, key: CacheKey, value: RowSet) {
        self.transactional(cache).put(key, value);
    }

    pub fn clear(&mut self, cache: &Arc<dyn Cache>) {
        self.transactional(cache).clear();
    }

    pub fn release(&mut self, cache: &Arc<dyn Cache>, key: &CacheKey) {
        if let Some(tx) = self.caches.get(&Self::slot(cache)) {
            tx.release(key);
        }
    }

    pub fn commit(&mut self) {
        for tx in self.caches.values() {
            tx.commit();
        }
    }

    pub fn rollback(&mut self) {
        for tx in self.caches.values() {
            tx.rollback();
        }
    }
}
