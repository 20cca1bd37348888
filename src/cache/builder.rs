/// Explicit cache composition.
///
/// Layers are applied in list order around the base store: the first layer
/// wraps `PerpetualCache` directly, the last one is what callers talk to.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use super::{
    BlockingCache, Cache, ExpiringCache, FifoCache, LoggingCache, LruCache, PerpetualCache,
    ScheduledCache, Strength, SynchronizedCache,
};

pub type LayerFn = Arc<dyn Fn(Box<dyn Cache>) -> Box<dyn Cache> + Send + Sync>;

#[derive(Clone)]
pub enum CacheLayer {
    Lru(usize),
    Fifo(usize),
    Expiring { strength: Strength, ttl: Option<Duration> },
    Scheduled(Duration),
    Logging,
    Synchronized,
    Blocking(Option<Duration>),
    /// Any other decorator constructor
    Custom(&'static str, LayerFn),
}

impl CacheLayer {
    fn wrap(&self, inner: Box<dyn Cache>) -> Box<dyn Cache> {
        match self {
            Self::Lru(capacity) => Box::new(LruCache::with_capacity(inner, *capacity)),
            Self::Fifo(capacity) => Box::new(FifoCache::with_capacity(inner, *capacity)),
            Self::Expiring { strength, ttl } => Box::new(ExpiringCache::with_ttl(
                inner,
                *strength,
                ttl.unwrap_or_else(|| strength.default_ttl()),
            )),
            Self::Scheduled(interval) => Box::new(ScheduledCache::new(inner, *interval)),
            Self::Logging => Box::new(LoggingCache::new(inner)),
            Self::Synchronized => Box::new(SynchronizedCache::new(inner)),
            Self::Blocking(timeout) => {
                let cache = BlockingCache::new(inner);
                Box::new(match timeout {
                    Some(t) => cache.with_timeout(*t),
                    None => cache,
                })
            }
            Self::Custom(_, constructor) => constructor(inner),
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Lru(_) => "lru",
            Self::Fifo(_) => "fifo",
            Self::Expiring { strength: Strength::Soft, .. } => "soft",
            Self::Expiring { strength: Strength::Weak, .. } => "weak",
            Self::Scheduled(_) => "scheduled",
            Self::Logging => "logging",
            Self::Synchronized => "synchronized",
            Self::Blocking(_) => "blocking",
            Self::Custom(name, _) => *name,
        }
    }
}

impl fmt::Debug for CacheLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct CacheBuilder {
    id: String,
    base: Option<Box<dyn Cache>>,
    layers: Vec<CacheLayer>,
}

impl CacheBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base: None,
            layers: Vec::new(),
        }
    }

    /// Standard stack derived from settings
    pub fn from_settings(id: impl Into<String>, settings: &CacheSettings) -> Self {
        Self::new(id).layers(settings.layers())
    }

    /// Replaces the default `PerpetualCache` base
    #[must_use]
    pub fn base(mut self, base: Box<dyn Cache>) -> Self {
        self.base = Some(base);
        self
    }

    #[must_use]
    pub fn layer(mut self, layer: CacheLayer) -> Self {
        self.layers.push(layer);
        self
    }

    #[must_use]
    pub fn layers(mut self, layers: impl IntoIterator<Item = CacheLayer>) -> Self {
        self.layers.extend(layers);
        self
    }

    /// Layer names from innermost to outermost
    pub fn composition(&self) -> Vec<&'static str> {
        self.layers.iter().map(CacheLayer::name).collect()
    }

    pub fn build_boxed(self) -> Box<dyn Cache> {
        let base: Box<dyn Cache> = match self.base {
            Some(base) => base,
            None => Box::new(PerpetualCache::new(self.id.clone())),
        };
        tracing::debug!(cache = %self.id, layers = ?self.layers, "building cache");
        self.layers.iter().fold(base, |inner, layer| layer.wrap(inner))
    }

    pub fn build(self) -> Arc<dyn Cache> {
        Arc::from(self.build_boxed())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Eviction {
    #[default]
    Lru,
    Fifo,
    Soft,
    Weak,
}

/// Namespace cache configuration as it appears in settings files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub eviction: Eviction,
    pub size: usize,
    pub flush_interval_ms: Option<u64>,
    /// Entry lifetime for soft/weak eviction
    pub ttl_ms: Option<u64>,
    pub blocking: bool,
    pub blocking_timeout_ms: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            eviction: Eviction::Lru,
            size: super::lru::DEFAULT_CAPACITY,
            flush_interval_ms: None,
            ttl_ms: None,
            blocking: false,
            blocking_timeout_ms: None,
        }
    }
}

impl CacheSettings {
    /// eviction, scheduled, logging, synchronized, blocking
    pub fn layers(&self) -> Vec<CacheLayer> {
        let mut layers = vec![match self.eviction {
            Eviction::Lru => CacheLayer::Lru(self.size),
            Eviction::Fifo => CacheLayer::Fifo(self.size),
            Eviction::Soft => CacheLayer::Expiring {
                strength: Strength::Soft,
                ttl: self.ttl_ms.map(Duration::from_millis),
            },
            Eviction::Weak => CacheLayer::Expiring {
                strength: Strength::Weak,
                ttl: self.ttl_ms.map(Duration::from_millis),
            },
        }];
        if let Some(ms) = self.flush_interval_ms {
            layers.push(CacheLayer::Scheduled(Duration::from_millis(ms)));
        }
        layers.push(CacheLayer::Logging);
        layers.push(CacheLayer::Synchronized);
        if self.blocking {
            layers.push(CacheLayer::Blocking(self.blocking_timeout_ms.map(Duration::from_millis)));
        }
        layers
    }
}
