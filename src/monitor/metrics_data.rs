//! Performance Monitor Data - Pure DOP
//!
//! Per-operation timing records, monitor events and report shapes.
//! Sampling logic lives in metrics_operations.rs

use crate::cache::CacheStats;
use chrono::{DateTime, Utc};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Timing statistics for one named operation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationMetrics {
    pub name: String,
    pub total_calls: u64,
    pub total_time: Duration,
    pub min_time: Duration,
    pub max_time: Duration,
    /// Running mean in milliseconds, updated per sample
    pub avg_ms: f64,
    /// Most recent samples, oldest first
    pub recent: VecDeque<Duration>,
    pub ring_size: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub error_count: u64,
    pub slow_count: u64,
}

/// Handle returned by `start`, consumed by `end`
#[must_use = "a measurement is only recorded when the token is passed to end()"]
#[derive(Debug)]
pub struct MeasureToken {
    pub operation: String,
    pub started: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    ThresholdExceeded {
        operation: String,
        elapsed: Duration,
        threshold: Duration,
    },
}

/// Four-level health classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HealthLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

/// Values the monitor's cache stores for the entity interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CachedValue {
    Number(f64),
    Vector(DVec3),
    Text(String),
    Flag(bool),
}

/// Report row for one operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationSummary {
    pub name: String,
    pub calls: u64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub recent_avg_ms: f64,
    pub threshold_ms: f64,
    pub slow_count: u64,
    pub error_count: u64,
    pub cache_hit_rate: f64,
}

/// Serializable snapshot of the whole monitor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub generated_at: DateTime<Utc>,
    pub total_calls: u64,
    pub error_rate: f64,
    pub slow_rate: f64,
    pub health: HealthLevel,
    /// Operations whose average exceeds their threshold
    pub slow_operations: Vec<String>,
    pub operations: Vec<OperationSummary>,
    pub cache: CacheStats,
}
