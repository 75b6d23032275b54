//! Query Cache Data
//!
//! Plain data for the TTL cache. Access bookkeeping uses atomics so a hit can
//! be recorded under a shared read lock.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// One cached result
#[derive(Debug)]
pub struct QueryCacheEntry<V> {
    pub key: String,
    pub result: V,
    /// Insertion time
    pub timestamp: Instant,
    pub ttl: Duration,
    pub access_count: AtomicU64,
    /// Nanoseconds since the owning cache's epoch
    pub last_access: AtomicU64,
}

impl<V> QueryCacheEntry<V> {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.timestamp) > self.ttl
    }

    pub fn accesses(&self) -> u64 {
        self.access_count.load(Ordering::Relaxed)
    }
}

/// Hit/miss counters shared by readers
#[derive(Debug, Default)]
pub struct CacheCounters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub expirations: AtomicU64,
}

/// Snapshot of cache health
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub hit_rate: f64,
}

/// Result of one adaptive tuning pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TuningSummary {
    pub extended: Vec<String>,
    pub shortened: Vec<String>,
}

impl TuningSummary {
    pub fn is_empty(&self) -> bool {
        self.extended.is_empty() && self.shortened.is_empty()
    }
}
