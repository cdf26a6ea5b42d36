//! TTL cache for idempotent completion results.
//!
//! A key→value store with per-entry expiry. Expired entries are removed when
//! read (lazy eviction); there is no background sweeper. The cache is
//! unbounded by default; an optional entry bound with least-hit eviction can
//! be enabled through configuration.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: bool,
    /// Maximum number of entries (None = unbounded)
    pub max_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: None,
        }
    }
}

/// A cached value with optional expiry
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    /// Expiry deadline; None means never expire
    expires_at: Option<Instant>,
    hits: u64,
}

impl CacheEntry {
    fn new(value: Value, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|t| Instant::now() + t),
            hits: 0,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|deadline| Instant::now() > deadline)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses
    pub misses: u64,
    /// Current number of entries
    pub entries: usize,
    /// Number of evictions (expiry + bound)
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate hit rate (0.0 when no lookups yet)
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// TTL cache with lazy eviction
pub struct TtlCache {
    config: CacheConfig,
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    stats: Arc<RwLock<CacheStats>>,
}

impl TtlCache {
    /// Create a new cache
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(CacheStats::default())),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Create a disabled cache (always misses, never stores)
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(CacheConfig {
            enabled: false,
            ..Default::default()
        })
    }

    /// Check if caching is enabled
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Get a cached value.
    ///
    /// Returns `None` if the key is absent or its entry has expired; an
    /// expired entry is deleted as a side effect of the lookup.
    pub async fn get(&self, key: &str) -> Option<Value> {
        if !self.config.enabled {
            return None;
        }

        let mut entries = self.entries.write().await;
        let mut stats = self.stats.write().await;

        match entries.get_mut(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                stats.misses += 1;
                stats.evictions += 1;
                stats.entries = entries.len();
                debug!(key, "Cache miss (expired)");
                None
            }
            Some(entry) => {
                entry.hits += 1;
                stats.hits += 1;
                debug!(key, hits = entry.hits, "Cache hit");
                Some(entry.value.clone())
            }
            None => {
                stats.misses += 1;
                debug!(key, "Cache miss");
                None
            }
        }
    }

    /// Store a value, overwriting any existing entry for the key.
    ///
    /// `ttl` of `None` means the entry never expires.
    pub async fn set(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>) {
        if !self.config.enabled {
            return;
        }

        let mut entries = self.entries.write().await;
        let mut stats = self.stats.write().await;

        if let Some(max) = self.config.max_entries {
            if entries.len() >= max {
                Self::evict(&mut entries, &mut stats, max);
            }
        }

        entries.insert(key.into(), CacheEntry::new(value, ttl));
        stats.entries = entries.len();
    }

    /// Drop expired entries, then least-hit entries until under the bound
    fn evict(entries: &mut HashMap<String, CacheEntry>, stats: &mut CacheStats, max: usize) {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());

        if entries.len() >= max {
            let to_remove = entries.len() - max + 1;
            let mut hit_counts: Vec<(String, u64)> = entries
                .iter()
                .map(|(k, v)| (k.clone(), v.hits))
                .collect();
            hit_counts.sort_by_key(|(_, hits)| *hits);

            for (key, _) in hit_counts.into_iter().take(to_remove) {
                entries.remove(&key);
            }
        }

        let removed = before - entries.len();
        stats.evictions += removed as u64;

        if removed > 0 {
            info!(removed, "Cache eviction completed");
        }
    }

    /// Remove all entries
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        let mut stats = self.stats.write().await;

        entries.clear();
        stats.entries = 0;

        info!("Cache cleared");
    }

    /// Current number of entries (expired-but-unread entries included)
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if the cache holds no entries
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        *self.stats.read().await
    }
}
