//! Generic TTL cache with lazy expiry and adaptive TTLs
//!
//! Expired entries are never returned even before they are physically purged.
//! Writers need `&mut self`; hits only need `&self` so lookups can run under a
//! read lock.

use super::query_cache_data::{CacheCounters, CacheStats, QueryCacheEntry, TuningSummary};
use crate::clock::SharedClock;
use crate::config::CacheConfig;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub struct QueryCache<V> {
    entries: FxHashMap<String, QueryCacheEntry<V>>,
    config: CacheConfig,
    clock: SharedClock,
    epoch: Instant,
    counters: CacheCounters,
}

impl<V: Clone> QueryCache<V> {
    pub fn new(config: CacheConfig, clock: SharedClock) -> Self {
        let epoch = clock.now();
        Self {
            entries: FxHashMap::default(),
            config,
            clock,
            epoch,
            counters: CacheCounters::default(),
        }
    }

    /// Look up a live entry, recording the access
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.access_count.fetch_add(1, Ordering::Relaxed);
                entry
                    .last_access
                    .store(self.nanos_since_epoch(now), Ordering::Relaxed);
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.result.clone())
            }
            _ => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or replace an entry. `None` uses the configured default TTL.
    pub fn put(&mut self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let now = self.clock.now();

        if !self.entries.contains_key(&key) && self.entries.len() >= self.config.max_size {
            self.make_room(now);
        }

        let entry = QueryCacheEntry {
            key: key.clone(),
            result: value,
            timestamp: now,
            ttl: ttl.unwrap_or_else(|| self.config.default_ttl()),
            access_count: AtomicU64::new(0),
            last_access: AtomicU64::new(self.nanos_since_epoch(now)),
        };
        self.entries.insert(key, entry);
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Invalidate by exact key or by a `*` wildcard pattern
    pub fn invalidate(&mut self, pattern: &str) -> usize {
        if !pattern.contains('*') {
            return usize::from(self.remove(pattern));
        }

        let Some(matcher) = wildcard_regex(pattern) else {
            log::warn!("[QueryCache] Ignoring unusable pattern '{}'", pattern);
            return 0;
        };
        self.invalidate_where(|key, _| matcher.is_match(key))
    }

    /// Invalidate every entry the predicate selects
    pub fn invalidate_where<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&str, &V) -> bool,
    {
        let before = self.entries.len();
        self.entries
            .retain(|key, entry| !predicate(key.as_str(), &entry.result));
        before - self.entries.len()
    }

    /// Physically drop expired entries
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before - self.entries.len();
        self.counters
            .expirations
            .fetch_add(purged as u64, Ordering::Relaxed);
        purged
    }

    /// Double TTLs of the hottest entries and halve those of the coldest
    pub fn adapt_ttls(&mut self) -> TuningSummary {
        let now = self.clock.now();
        let mut ranked: Vec<(u64, &String)> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, entry)| (entry.accesses(), key))
            .collect();

        if ranked.len() < 2 {
            return TuningSummary::default();
        }

        // Hottest first, ties broken by key so passes are reproducible
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        let hottest = ranked[0].0;
        let coldest = ranked[ranked.len() - 1].0;
        if hottest == coldest {
            return TuningSummary::default();
        }

        let band = ((ranked.len() as f64 * self.config.tuning_fraction).floor() as usize)
            .max(1)
            .min(ranked.len() / 2);

        let hot: Vec<String> = ranked
            .iter()
            .take(band)
            .filter(|(count, _)| *count > coldest)
            .map(|(_, key)| (*key).clone())
            .collect();
        let cold: Vec<String> = ranked
            .iter()
            .rev()
            .take(band)
            .filter(|(count, _)| *count < hottest)
            .map(|(_, key)| (*key).clone())
            .collect();

        let (min_ttl, max_ttl) = (self.config.min_ttl(), self.config.max_ttl());
        for key in &hot {
            if let Some(entry) = self.entries.get_mut(key) {
                entry.ttl = (entry.ttl * 2).min(max_ttl);
            }
        }
        for key in &cold {
            if let Some(entry) = self.entries.get_mut(key) {
                entry.ttl = (entry.ttl / 2).max(min_ttl);
            }
        }

        log::debug!(
            "[QueryCache] Adaptive tuning extended {} and shortened {} entries",
            hot.len(),
            cold.len()
        );

        TuningSummary {
            extended: hot,
            shortened: cold,
        }
    }

    /// Current TTL of a live entry
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.ttl)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn max_size(&self) -> usize {
        self.config.max_size
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            entries: self.entries.len(),
            hits,
            misses,
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }

    /// Free at least one slot: expired entries first, then the oldest ~10%
    fn make_room(&mut self, now: Instant) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let expired = before - self.entries.len();
        self.counters
            .expirations
            .fetch_add(expired as u64, Ordering::Relaxed);

        if self.entries.len() < self.config.max_size {
            return;
        }

        let target = ((self.entries.len() as f64 * self.config.eviction_fraction).ceil() as usize)
            .max(self.entries.len() + 1 - self.config.max_size);

        let mut by_age: Vec<(Instant, String)> = self
            .entries
            .values()
            .map(|entry| (entry.timestamp, entry.key.clone()))
            .collect();
        by_age.sort();

        for (_, key) in by_age.into_iter().take(target) {
            self.entries.remove(&key);
        }
        self.counters
            .evictions
            .fetch_add(target as u64, Ordering::Relaxed);

        log::debug!("[QueryCache] Evicted {} oldest entries", target);
    }

    fn nanos_since_epoch(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.epoch).as_nanos() as u64
    }
}

/// Compile a `*` wildcard pattern into an anchored regex
fn wildcard_regex(pattern: &str) -> Option<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{}$", body)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn cache_with(max_size: usize) -> (QueryCache<u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let config = CacheConfig {
            max_size,
            ..CacheConfig::default()
        };
        (QueryCache::new(config, clock.clone()), clock)
    }

    #[test]
    fn test_expired_entry_never_returned() {
        let (mut cache, clock) = cache_with(10);
        cache.put("hull:alpha1", 80, Some(Duration::from_secs_f64(0.01)));
        assert_eq!(cache.get("hull:alpha1"), Some(80));

        clock.advance(Duration::from_millis(20));
        assert_eq!(cache.get("hull:alpha1"), None);
        // Still physically present until purged
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_size_bound_holds_after_every_insert() {
        let (mut cache, clock) = cache_with(20);
        for i in 0..100u32 {
            cache.put(format!("key{}", i), i, None);
            clock.advance(Duration::from_millis(1));
            assert!(cache.len() <= 20);
        }
        // Newest entry always survives
        assert_eq!(cache.get("key99"), Some(99));
        assert!(cache.stats().evictions > 0);
    }

    #[test]
    fn test_eviction_removes_oldest() {
        let (mut cache, clock) = cache_with(10);
        for i in 0..10u32 {
            cache.put(format!("key{}", i), i, None);
            clock.advance(Duration::from_millis(1));
        }
        cache.put("key10", 10, None);

        assert_eq!(cache.get("key0"), None);
        assert_eq!(cache.get("key1"), Some(1));
        assert_eq!(cache.len(), 10);
    }

    #[test]
    fn test_wildcard_invalidation() {
        let (mut cache, _clock) = cache_with(10);
        cache.put("hull:alpha1", 1, None);
        cache.put("shield:alpha1", 2, None);
        cache.put("hull:beta2", 3, None);

        assert_eq!(cache.invalidate("*:alpha1"), 2);
        assert_eq!(cache.get("hull:beta2"), Some(3));
        assert_eq!(cache.invalidate("hull:beta2"), 1);
        assert_eq!(cache.invalidate("hull:beta2"), 0);
    }

    #[test]
    fn test_wildcard_escapes_regex_characters() {
        let (mut cache, _clock) = cache_with(10);
        cache.put("dist:a.b", 1, None);
        cache.put("dist:aXb", 2, None);

        assert_eq!(cache.invalidate("dist:a.*"), 1);
        assert_eq!(cache.get("dist:aXb"), Some(2));
    }

    #[test]
    fn test_adaptive_ttls() {
        let (mut cache, _clock) = cache_with(100);
        let base = Duration::from_secs(4);
        for i in 0..10u32 {
            cache.put(format!("key{}", i), i, Some(base));
        }
        for _ in 0..50 {
            cache.get("key3");
        }
        for i in 0..9u32 {
            if i != 3 {
                cache.get(&format!("key{}", i));
            }
        }

        let summary = cache.adapt_ttls();
        assert_eq!(summary.extended, vec!["key3".to_string()]);
        assert_eq!(summary.shortened, vec!["key9".to_string()]);
        assert_eq!(cache.ttl_of("key3"), Some(base * 2));
        assert_eq!(cache.ttl_of("key9"), Some(base / 2));
        assert_eq!(cache.ttl_of("key5"), Some(base));
    }

    #[test]
    fn test_uniform_access_leaves_ttls_alone() {
        let (mut cache, _clock) = cache_with(100);
        cache.put("a", 1, None);
        cache.put("b", 2, None);
        assert!(cache.adapt_ttls().is_empty());
    }

    #[test]
    fn test_hit_rate() {
        let (mut cache, _clock) = cache_with(10);
        cache.put("a", 1, None);
        cache.get("a");
        cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }
}
