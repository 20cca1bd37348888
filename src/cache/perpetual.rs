use std::collections::HashMap;
use parking_lot::Mutex;
use crate::core::RowSet;
use super::{Cache, CacheKey};

/// Unbounded map store at the bottom of every cache stack
#[derive(Debug)]
pub struct PerpetualCache {
    id: String,
    entries: Mutex<HashMap<CacheKey, RowSet>>,
}

impl PerpetualCache {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.lock().contains_key(key)
    }
}

impl Cache for PerpetualCache {
    fn id(&self) -> &str {
        &self.id
    }

    fn put(&self, key: CacheKey, value: RowSet) {
        self.entries.lock().insert(key, value);
    }

    fn get(&self, key: &CacheKey) -> Option<RowSet> {
        self.entries.lock().get(key).cloned()
    }

    fn remove(&self, key: &CacheKey) -> Option<RowSet> {
        self.entries.lock().remove(key)
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }

    fn size(&self) -> usize {
        self.entries.lock().len()
    }
}
