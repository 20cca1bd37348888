/// Query result caches
///
/// Every cache implements the same small `Cache` interface. `PerpetualCache`
/// is the only store; everything else is a decorator that wraps another
/// `Cache` and changes one concern (eviction, locking, expiry, transactional
/// visibility). `CacheBuilder` folds an explicit, ordered list of layers
/// around a base so composition order is plain configuration.
pub mod key;
pub mod perpetual;
pub mod lru;
pub mod fifo;
pub mod blocking;
pub mod synchronized;
pub mod expiring;
pub mod scheduled;
pub mod logging;
pub mod transactional;
pub mod builder;

pub use key::{CacheKey, KeyPart};
pub use perpetual::PerpetualCache;
pub use lru::LruCache;
pub use fifo::FifoCache;
pub use blocking::BlockingCache;
pub use synchronized::SynchronizedCache;
pub use expiring::{ExpiringCache, Strength};
pub use scheduled::ScheduledCache;
pub use logging::LoggingCache;
pub use transactional::{TransactionalCache, TransactionalCacheManager};
pub use builder::{CacheBuilder, CacheLayer, CacheSettings, Eviction};

use crate::core::RowSet;

/// Key/value store for query results.
///
/// All methods take `&self`; each implementation carries whatever interior
/// locking it needs to stay memory safe. Atomicity across a decorator's own
/// bookkeeping and its delegate is only guaranteed when a
/// `SynchronizedCache` or `BlockingCache` wraps the stack.
pub trait Cache: Send + Sync {
    fn id(&self) -> &str;

    fn put(&self, key: CacheKey, value: RowSet);

    fn get(&self, key: &CacheKey) -> Option<RowSet>;

    fn remove(&self, key: &CacheKey) -> Option<RowSet>;

    fn clear(&self);

    fn size(&self) -> usize;
}
