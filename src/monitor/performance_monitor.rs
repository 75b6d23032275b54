//! Performance Monitor
//!
//! Brackets entity operations with timing, flags samples that exceed their
//! per-operation threshold, and owns the shared result cache together with
//! its periodic adaptive tuning.

use super::batch_queue::BatchQueue;
use super::metrics_data::{
    CachedValue, HealthLevel, MeasureToken, MonitorEvent, OperationMetrics, PerformanceReport,
};
use super::metrics_operations as ops;
use crate::cache::{QueryCache, TuningSummary};
use crate::clock::SharedClock;
use crate::config::MonitorConfig;
use crate::event_bus::EventBus;
use crossbeam_channel::Receiver;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::time::{Duration, Instant};

pub struct PerformanceMonitor {
    metrics: RwLock<FxHashMap<String, OperationMetrics>>,
    cache: RwLock<QueryCache<CachedValue>>,
    events: EventBus<MonitorEvent>,
    clock: SharedClock,
    config: MonitorConfig,
    last_tuning: Mutex<Instant>,
}

impl PerformanceMonitor {
    pub fn new(config: MonitorConfig, clock: SharedClock) -> Self {
        let now = clock.now();
        Self {
            metrics: RwLock::new(FxHashMap::default()),
            cache: RwLock::new(QueryCache::new(config.cache.clone(), clock.clone())),
            events: EventBus::new(),
            clock,
            config,
            last_tuning: Mutex::new(now),
        }
    }

    // ========================================================================
    // MEASUREMENT
    // ========================================================================

    pub fn start(&self, operation: &str) -> MeasureToken {
        MeasureToken {
            operation: operation.to_string(),
            started: self.clock.now(),
        }
    }

    /// Close a measurement and return its elapsed time
    pub fn end(&self, token: MeasureToken, cache_hit: bool, had_error: bool) -> Duration {
        let elapsed = self.clock.now().saturating_duration_since(token.started);
        self.record(&token.operation, elapsed, cache_hit, had_error);
        self.maybe_tune();
        elapsed
    }

    /// Record an externally timed sample
    pub fn record(&self, operation: &str, elapsed: Duration, cache_hit: bool, had_error: bool) {
        let threshold = self.config.threshold_for(operation);
        let slow = {
            let mut metrics = self.metrics.write();
            let ring_size = self.config.sample_ring_size;
            let entry = metrics
                .entry(operation.to_string())
                .or_insert_with(|| ops::create_operation_metrics(operation, ring_size));
            ops::record_sample(entry, elapsed, threshold, cache_hit, had_error)
        };

        if slow {
            log::warn!(
                "[PerfMonitor] {} took {:.3}ms (threshold {:.3}ms)",
                operation,
                ops::as_ms(elapsed),
                ops::as_ms(threshold)
            );
            self.events.emit(MonitorEvent::ThresholdExceeded {
                operation: operation.to_string(),
                elapsed,
                threshold,
            });
        }
    }

    pub fn metrics_for(&self, operation: &str) -> Option<OperationMetrics> {
        self.metrics.read().get(operation).cloned()
    }

    // ========================================================================
    // CACHE
    // ========================================================================

    pub fn cache_get(&self, key: &str) -> Option<CachedValue> {
        self.cache.read().get(key)
    }

    /// `None` uses the cache's default TTL
    pub fn cache_put(&self, key: impl Into<String>, value: CachedValue, ttl: Option<Duration>) {
        self.cache.write().put(key, value, ttl);
    }

    /// Exact key or single-wildcard pattern
    pub fn invalidate(&self, pattern: &str) -> usize {
        self.cache.write().invalidate(pattern)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.read().len()
    }

    /// Run adaptive tuning if the tuning interval has elapsed
    pub fn maybe_tune(&self) -> Option<TuningSummary> {
        let now = self.clock.now();
        {
            let Some(mut last) = self.last_tuning.try_lock() else {
                return None;
            };
            if now.saturating_duration_since(*last) < self.config.tuning_interval() {
                return None;
            }
            *last = now;
        }
        Some(self.tune())
    }

    /// Adapt TTLs to access frequency and drop expired entries
    pub fn tune(&self) -> TuningSummary {
        let mut cache = self.cache.write();
        let expired = cache.purge_expired();
        let summary = cache.adapt_ttls();
        log::debug!(
            "[PerfMonitor] Tuned cache: {} extended, {} shortened, {} expired",
            summary.extended.len(),
            summary.shortened.len(),
            expired
        );
        summary
    }

    // ========================================================================
    // BATCHING
    // ========================================================================

    /// A queue sized to this monitor's batch limits
    pub fn batch_queue<T>(&self) -> BatchQueue<T> {
        BatchQueue::new(self.config.batch_max_size, self.config.batch_budget())
    }

    // ========================================================================
    // REPORTING
    // ========================================================================

    /// (total calls, error rate, slow rate) over every operation
    fn rates(&self) -> (u64, f64, f64) {
        let metrics = self.metrics.read();
        let (calls, errors, slow) = metrics.values().fold((0, 0, 0), |acc, m| {
            (acc.0 + m.total_calls, acc.1 + m.error_count, acc.2 + m.slow_count)
        });
        (calls, ops::ratio(errors, calls), ops::ratio(slow, calls))
    }

    pub fn health(&self) -> HealthLevel {
        let (_, error_rate, slow_rate) = self.rates();
        ops::classify_health(error_rate, slow_rate)
    }

    pub fn report(&self) -> PerformanceReport {
        let (total_calls, error_rate, slow_rate) = self.rates();

        let mut operations: Vec<_> = self
            .metrics
            .read()
            .values()
            .map(|m| ops::summarize(m, self.config.threshold_for(&m.name)))
            .collect();
        operations.sort_by(|a, b| a.name.cmp(&b.name));

        let slow_operations = operations
            .iter()
            .filter(|summary| summary.avg_ms > summary.threshold_ms)
            .map(|summary| summary.name.clone())
            .collect();

        PerformanceReport {
            generated_at: chrono::Utc::now(),
            total_calls,
            error_rate,
            slow_rate,
            health: ops::classify_health(error_rate, slow_rate),
            slow_operations,
            operations,
            cache: self.cache.read().stats(),
        }
    }

    pub fn log_report(&self) {
        match serde_json::to_string_pretty(&self.report()) {
            Ok(json) => log::info!("[PerfMonitor] Performance report:\n{}", json),
            Err(e) => log::warn!("[PerfMonitor] Failed to serialize report: {}", e),
        }
    }

    pub fn subscribe(&self) -> Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    /// Forget all samples and cached values
    pub fn reset(&self) {
        self.metrics.write().clear();
        self.cache.write().clear();
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }
}
