//! In-memory result cache.
//!
//! Entries are spread over independently locked shards so lookups for
//! different fingerprints rarely contend. Capacity and recency are global:
//! nothing is evicted until the cache holds `capacity` entries, and the
//! entry evicted is the least recently used one across every shard.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use normalize::Fingerprint;
//! use store::{AnalysisResult, CacheConfig, ResultCache};
//!
//! let cache = ResultCache::new(CacheConfig::default()).unwrap();
//! let fp = Fingerprint::compute(1, "en", "Some text.", b"");
//! cache.put(fp, Arc::new(AnalysisResult::new(fp, Vec::new())));
//! assert!(cache.get(&fp).is_some());
//! ```

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use normalize::Fingerprint;
use serde::Serialize;
use tracing::trace;

use crate::{AnalysisResult, StoreError};

pub const DEFAULT_CACHE_CAPACITY: usize = 1024;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_CACHE_SHARDS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Total entry budget across all shards.
    pub capacity: usize,
    pub ttl: Duration,
    /// Number of independently locked shards.
    pub shards: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            ttl: DEFAULT_CACHE_TTL,
            shards: DEFAULT_CACHE_SHARDS,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.capacity == 0 {
            return Err(StoreError::InvalidConfig("cache capacity must be at least 1".into()));
        }
        if self.shards == 0 {
            return Err(StoreError::InvalidConfig("cache shards must be at least 1".into()));
        }
        if self.ttl.is_zero() {
            return Err(StoreError::InvalidConfig("cache ttl must be non-zero".into()));
        }
        Ok(())
    }
}

/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    pub expirations: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

struct Entry {
    value: Arc<AnalysisResult>,
    inserted: Instant,
    /// Global access tick. Within a shard it rises from LRU to MRU.
    touched: u64,
}

type Shard = LruCache<Fingerprint, Entry>;

/// Bounded, TTL-aware LRU of analysis results, sharded by fingerprint.
pub struct ResultCache {
    shards: Vec<Mutex<Shard>>,
    capacity: usize,
    ttl: Duration,
    /// Live entry count used to enforce `capacity`.
    entries: AtomicUsize,
    clock: AtomicU64,
    counters: Counters,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("shards", &self.shards.len())
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("stats", &self.stats())
            .finish()
    }
}

fn lock(shard: &Mutex<Shard>) -> MutexGuard<'_, Shard> {
    // A panic while holding the lock cannot leave an entry half-written.
    shard.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let shard_count = config.shards.min(config.capacity);
        let shards = (0..shard_count)
            .map(|_| Mutex::new(LruCache::unbounded()))
            .collect();
        Ok(Self {
            shards,
            capacity: config.capacity,
            ttl: config.ttl,
            entries: AtomicUsize::new(0),
            clock: AtomicU64::new(0),
            counters: Counters::default(),
        })
    }

    fn shard(&self, fingerprint: &Fingerprint) -> MutexGuard<'_, Shard> {
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&fingerprint.as_bytes()[..8]);
        let idx = (u64::from_le_bytes(prefix) % self.shards.len() as u64) as usize;
        lock(&self.shards[idx])
    }

    /// Called with the entry's shard locked, so ticks within a shard follow
    /// its LRU order.
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn removed(&self, count: usize) {
        if count > 0 {
            self.entries.fetch_sub(count, Ordering::Relaxed);
        }
    }

    /// Look up a live entry. Expired entries are dropped and reported as a miss.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<AnalysisResult>> {
        let mut shard = self.shard(fingerprint);
        let expired = match shard.get_mut(fingerprint) {
            Some(entry) if entry.inserted.elapsed() < self.ttl => {
                entry.touched = self.tick();
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(&entry.value));
            }
            Some(_) => true,
            None => false,
        };
        if expired && shard.pop(fingerprint).is_some() {
            self.removed(1);
            self.counters.expirations.fetch_add(1, Ordering::Relaxed);
            trace!(fingerprint = %fingerprint, "cache_entry_expired");
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert or replace. The most recent write wins. Inserting a new key
    /// into a full cache evicts the least recently used entry.
    pub fn put(&self, fingerprint: Fingerprint, value: Arc<AnalysisResult>) {
        let replaced = {
            let mut shard = self.shard(&fingerprint);
            let entry = Entry {
                value,
                inserted: Instant::now(),
                touched: self.tick(),
            };
            shard.put(fingerprint, entry).is_some()
        };
        self.counters.insertions.fetch_add(1, Ordering::Relaxed);
        if replaced {
            return;
        }
        // Each insert past capacity pays for exactly one eviction.
        if self.entries.fetch_add(1, Ordering::Relaxed) >= self.capacity {
            self.evict_lru();
        }
    }

    /// Remove the entry with the oldest access tick across all shards. Only
    /// one shard lock is held at a time.
    fn evict_lru(&self) {
        loop {
            let victim = self
                .shards
                .iter()
                .enumerate()
                .filter_map(|(idx, shard)| {
                    lock(shard)
                        .peek_lru()
                        .map(|(fp, entry)| (entry.touched, idx, *fp))
                })
                .min();
            let Some((touched, idx, fingerprint)) = victim else {
                return;
            };

            let mut shard = lock(&self.shards[idx]);
            let unchanged = shard
                .peek_lru()
                .is_some_and(|(fp, entry)| *fp == fingerprint && entry.touched == touched);
            if unchanged {
                shard.pop_lru();
                drop(shard);
                self.removed(1);
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                trace!(fingerprint = %fingerprint, "cache_entry_evicted");
                return;
            }
            // Touched or removed since the scan; pick again.
        }
    }

    pub fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        let removed = self.shard(fingerprint).pop(fingerprint).is_some();
        if removed {
            self.removed(1);
        }
        removed
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            let mut shard = lock(shard);
            let count = shard.len();
            shard.clear();
            self.removed(count);
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = lock(shard);
            let stale: Vec<Fingerprint> = shard
                .iter()
                .filter(|(_, entry)| entry.inserted.elapsed() >= self.ttl)
                .map(|(fp, _)| *fp)
                .collect();
            for fp in &stale {
                shard.pop(fp);
            }
            self.removed(stale.len());
            removed += stale.len();
        }
        self.counters
            .expirations
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Entries currently held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| lock(shard).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            insertions: self.counters.insertions.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn fp(n: u32) -> Fingerprint {
        Fingerprint::compute(1, "en", &format!("doc {n}"), b"")
    }

    fn result(n: u32) -> Arc<AnalysisResult> {
        Arc::new(AnalysisResult::new(fp(n), Vec::new()))
    }

    fn single_shard(capacity: usize, ttl: Duration) -> ResultCache {
        ResultCache::new(CacheConfig {
            capacity,
            ttl,
            shards: 1,
        })
        .unwrap()
    }

    #[test]
    fn miss_then_hit() {
        let cache = ResultCache::new(CacheConfig::default()).unwrap();
        assert!(cache.get(&fp(1)).is_none());
        cache.put(fp(1), result(1));
        assert_eq!(cache.get(&fp(1)).unwrap().fingerprint, fp(1));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.insertions), (1, 1, 1));
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = single_shard(2, DEFAULT_CACHE_TTL);
        cache.put(fp(1), result(1));
        cache.put(fp(2), result(2));
        // Touch 1 so 2 becomes the eviction candidate.
        assert!(cache.get(&fp(1)).is_some());
        cache.put(fp(3), result(3));

        assert!(cache.get(&fp(1)).is_some());
        assert!(cache.get(&fp(2)).is_none());
        assert!(cache.get(&fp(3)).is_some());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn default_config_fills_to_capacity_before_evicting() {
        let cache = ResultCache::new(CacheConfig::default()).unwrap();
        let capacity = DEFAULT_CACHE_CAPACITY as u32;
        for n in 0..capacity {
            cache.put(fp(n), result(n));
        }
        assert_eq!(cache.len(), DEFAULT_CACHE_CAPACITY);
        assert_eq!(cache.stats().evictions, 0);

        cache.put(fp(capacity), result(capacity));
        assert_eq!(cache.len(), DEFAULT_CACHE_CAPACITY);
        assert_eq!(cache.stats().evictions, 1);
        assert!(cache.get(&fp(0)).is_none(), "oldest entry should go first");
        assert!(cache.get(&fp(capacity)).is_some());
    }

    #[test]
    fn eviction_order_is_global_across_shards() {
        let cache = ResultCache::new(CacheConfig {
            capacity: 8,
            ttl: DEFAULT_CACHE_TTL,
            shards: 4,
        })
        .unwrap();
        for n in 0..8 {
            cache.put(fp(n), result(n));
        }
        // Refresh everything except 3, making it the global LRU entry.
        for n in (0..8).filter(|&n| n != 3) {
            assert!(cache.get(&fp(n)).is_some());
        }
        cache.put(fp(8), result(8));

        assert!(cache.get(&fp(3)).is_none());
        for n in (0..9).filter(|&n| n != 3) {
            assert!(cache.get(&fp(n)).is_some(), "entry {n} was evicted");
        }
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn replacing_is_not_an_eviction() {
        let cache = single_shard(2, DEFAULT_CACHE_TTL);
        cache.put(fp(1), result(1));
        let newer = Arc::new(AnalysisResult::new(fp(1), Vec::new()));
        cache.put(fp(1), Arc::clone(&newer));

        assert!(Arc::ptr_eq(&cache.get(&fp(1)).unwrap(), &newer));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = single_shard(4, Duration::from_millis(20));
        cache.put(fp(1), result(1));
        assert!(cache.get(&fp(1)).is_some());

        thread::sleep(Duration::from_millis(40));
        assert!(cache.get(&fp(1)).is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn purge_expired_sweeps_all_shards() {
        let cache = ResultCache::new(CacheConfig {
            capacity: 16,
            ttl: Duration::from_millis(20),
            shards: 4,
        })
        .unwrap();
        for n in 0..8 {
            cache.put(fp(n), result(n));
        }
        thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.purge_expired(), 8);
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_and_clear() {
        let cache = ResultCache::new(CacheConfig::default()).unwrap();
        cache.put(fp(1), result(1));
        cache.put(fp(2), result(2));
        assert!(cache.invalidate(&fp(1)));
        assert!(!cache.invalidate(&fp(1)));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn invalid_configs_rejected() {
        let zero_capacity = CacheConfig {
            capacity: 0,
            ..CacheConfig::default()
        };
        assert!(ResultCache::new(zero_capacity).is_err());
        let zero_shards = CacheConfig {
            shards: 0,
            ..CacheConfig::default()
        };
        assert!(ResultCache::new(zero_shards).is_err());
        let zero_ttl = CacheConfig {
            ttl: Duration::ZERO,
            ..CacheConfig::default()
        };
        assert!(ResultCache::new(zero_ttl).is_err());
    }

    #[test]
    fn concurrent_access_is_consistent() {
        let cache = Arc::new(
            ResultCache::new(CacheConfig {
                capacity: 8192,
                ..CacheConfig::default()
            })
            .unwrap(),
        );
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for n in 0..50 {
                        let key = fp(t * 100 + n);
                        cache.put(key, Arc::new(AnalysisResult::new(key, Vec::new())));
                        assert_eq!(cache.get(&key).unwrap().fingerprint, key);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 400);
    }
}
