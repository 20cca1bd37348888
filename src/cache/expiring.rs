/// Reference-strength approximation.
///
/// Instead of relying on a garbage collector, every entry gets a deadline
/// when it is written and is dropped lazily by the first `get` that finds it
/// past due. `Strength::Soft` additionally pins the most recently read
/// entries, which survive their deadline as long as they stay hot.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use crate::core::RowSet;
use super::{Cache, CacheKey};

pub const DEFAULT_HARD_LINKS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Soft,
    Weak,
}

impl Strength {
    /// Default lifetime when none is configured
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        match self {
            Self::Soft => Duration::from_secs(300),
            Self::Weak => Duration::from_secs(30),
        }
    }
}

struct ExpiryState {
    deadlines: HashMap<CacheKey, Instant>,
    /// Most recently read keys, newest at the front (soft only)
    hard_links: VecDeque<CacheKey>,
}

pub struct ExpiringCache {
    delegate: Box<dyn Cache>,
    strength: Strength,
    ttl: Duration,
    hard_link_limit: usize,
    state: Mutex<ExpiryState>,
}

impl ExpiringCache {
    pub fn new(delegate: Box<dyn Cache>, strength: Strength) -> Self {
        Self::with_ttl(delegate, strength, strength.default_ttl())
    }

    pub fn with_ttl(delegate: Box<dyn Cache>, strength: Strength, ttl: Duration) -> Self {
        let hard_link_limit = match strength {
            Strength::Soft => DEFAULT_HARD_LINKS,
            Strength::Weak => 0,
        };
        Self {
            delegate,
            strength,
            ttl,
            hard_link_limit,
            state: Mutex::new(ExpiryState {
                deadlines: HashMap::new(),
                hard_links: VecDeque::new(),
            }),
        }
    }

    #[must_use]
    pub fn with_hard_links(mut self, limit: usize) -> Self {
        if self.strength == Strength::Soft {
            self.hard_link_limit = limit;
        }
        self
    }

    pub const fn strength(&self) -> Strength {
        self.strength
    }

    /// True if the key may still be read; refreshes pinned keys
    fn check_live(&self, key: &CacheKey) -> bool {
        let mut state = self.state.lock();
        let now = Instant::now();
        let expired = state.deadlines.get(key).is_some_and(|deadline| *deadline <= now);
        if !expired {
            return true;
        }
        if state.hard_links.contains(key) {
            state.deadlines.insert(key.clone(), now + self.ttl);
            return true;
        }
        state.deadlines.remove(key);
        false
    }

    fn pin(&self, key: &CacheKey) {
        if self.hard_link_limit == 0 {
            return;
        }
        let mut state = self.state.lock();
        state.hard_links.retain(|k| k != key);
        state.hard_links.push_front(key.clone());
        let limit = self.hard_link_limit;
        state.hard_links.truncate(limit);
    }
}

impl Cache for ExpiringCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&self, key: CacheKey, value: RowSet) {
        self.state.lock().deadlines.insert(key.clone(), Instant::now() + self.ttl);
        self.delegate.put(key, value);
    }

    fn get(&self, key: &CacheKey) -> Option<RowSet> {
        if !self.check_live(key) {
            tracing::trace!(cache = self.id(), "entry reclaimed");
            self.delegate.remove(key);
            return None;
        }
        let value = self.delegate.get(key);
        if value.is_some() {
            self.pin(key);
        }
        value
    }

    fn remove(&self, key: &CacheKey) -> Option<RowSet> {
        {
            let mut state = self.state.lock();
            state.deadlines.remove(key);
            state.hard_links.retain(|k| k != key);
        }
        self.delegate.remove(key)
    }

    fn clear(&self) {
        {
            let mut state = self.state.lock();
            state.deadlines.clear();
            state.hard_links.clear();
        }
        self.delegate.clear();
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::{key, rows};
    use crate::cache::PerpetualCache;
    use std::thread;

    fn expiring(strength: Strength, ttl_ms: u64) -> ExpiringCache {
        ExpiringCache::with_ttl(
            Box::new(PerpetualCache::new("ref")),
            strength,
            Duration::from_millis(ttl_ms),
        )
    }

    #[test]
    fn test_weak_entry_expires_lazily() {
        let cache = expiring(Strength::Weak, 20);
        cache.put(key("a"), rows(1));
        assert_eq!(cache.get(&key("a")), Some(rows(1)));

        thread::sleep(Duration::from_millis(40));
        // still physically present until someone reads it
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.get(&key("a")), None);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_soft_keeps_recently_read_entries() {
        let cache = expiring(Strength::Soft, 20).with_hard_links(1);
        cache.put(key("hot"), rows(1));
        cache.put(key("cold"), rows(2));
        assert!(cache.get(&key("hot")).is_some());

        thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get(&key("hot")), Some(rows(1)));
        assert_eq!(cache.get(&key("cold")), None);
    }

    #[test]
    fn test_weak_has_no_hard_links() {
        let cache = expiring(Strength::Weak, 20).with_hard_links(10);
        cache.put(key("a"), rows(1));
        assert!(cache.get(&key("a")).is_some());
        thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get(&key("a")), None);
    }
}
