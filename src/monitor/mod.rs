//! Performance Monitor
//!
//! Timing and threshold instrumentation, the shared result cache, adaptive
//! tuning and frame-budgeted batching.

pub mod batch_queue;
pub mod metrics_data;
pub mod metrics_operations;
pub mod performance_monitor;

pub use batch_queue::BatchQueue;
pub use metrics_data::{
    CachedValue, HealthLevel, MeasureToken, MonitorEvent, OperationMetrics, OperationSummary,
    PerformanceReport,
};
pub use performance_monitor::PerformanceMonitor;
