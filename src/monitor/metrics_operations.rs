//! Performance Monitor Operations - Pure functions over metrics data

use super::metrics_data::{HealthLevel, OperationMetrics, OperationSummary};
use std::collections::VecDeque;
use std::time::Duration;

/// Error and slow-call rates at or below these mark each health level
const HEALTH_BANDS: [(HealthLevel, f64, f64); 3] = [
    (HealthLevel::Excellent, 0.01, 0.05),
    (HealthLevel::Good, 0.05, 0.15),
    (HealthLevel::Fair, 0.15, 0.30),
];

pub fn create_operation_metrics(name: &str, ring_size: usize) -> OperationMetrics {
    OperationMetrics {
        name: name.to_string(),
        total_calls: 0,
        total_time: Duration::ZERO,
        min_time: Duration::MAX,
        max_time: Duration::ZERO,
        avg_ms: 0.0,
        recent: VecDeque::with_capacity(ring_size),
        ring_size,
        cache_hits: 0,
        cache_misses: 0,
        error_count: 0,
        slow_count: 0,
    }
}

/// Fold one sample into the metrics. Returns true if it was slow.
pub fn record_sample(
    metrics: &mut OperationMetrics,
    elapsed: Duration,
    threshold: Duration,
    cache_hit: bool,
    had_error: bool,
) -> bool {
    metrics.total_calls += 1;
    metrics.total_time += elapsed;
    metrics.min_time = metrics.min_time.min(elapsed);
    metrics.max_time = metrics.max_time.max(elapsed);

    let sample_ms = as_ms(elapsed);
    metrics.avg_ms += (sample_ms - metrics.avg_ms) / metrics.total_calls as f64;

    if metrics.ring_size > 0 {
        if metrics.recent.len() >= metrics.ring_size {
            metrics.recent.pop_front();
        }
        metrics.recent.push_back(elapsed);
    }

    if cache_hit {
        metrics.cache_hits += 1;
    } else {
        metrics.cache_misses += 1;
    }
    if had_error {
        metrics.error_count += 1;
    }

    let slow = elapsed > threshold;
    if slow {
        metrics.slow_count += 1;
    }
    slow
}

pub fn recent_average_ms(metrics: &OperationMetrics) -> f64 {
    if metrics.recent.is_empty() {
        return 0.0;
    }
    let total: Duration = metrics.recent.iter().sum();
    as_ms(total) / metrics.recent.len() as f64
}

pub fn summarize(metrics: &OperationMetrics, threshold: Duration) -> OperationSummary {
    let lookups = metrics.cache_hits + metrics.cache_misses;
    OperationSummary {
        name: metrics.name.clone(),
        calls: metrics.total_calls,
        avg_ms: metrics.avg_ms,
        min_ms: if metrics.total_calls == 0 {
            0.0
        } else {
            as_ms(metrics.min_time)
        },
        max_ms: as_ms(metrics.max_time),
        recent_avg_ms: recent_average_ms(metrics),
        threshold_ms: as_ms(threshold),
        slow_count: metrics.slow_count,
        error_count: metrics.error_count,
        cache_hit_rate: ratio(metrics.cache_hits, lookups),
    }
}

/// Combine error and slow-call rates into a health level
pub fn classify_health(error_rate: f64, slow_rate: f64) -> HealthLevel {
    HEALTH_BANDS
        .iter()
        .find(|(_, max_errors, max_slow)| error_rate <= *max_errors && slow_rate <= *max_slow)
        .map(|(level, _, _)| *level)
        .unwrap_or(HealthLevel::Poor)
}

pub fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

pub fn as_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_average_matches_mean() {
        let mut metrics = create_operation_metrics("distance", 100);
        let samples: Vec<Duration> = (1..=37).map(|i| Duration::from_micros(i * 13)).collect();
        for sample in &samples {
            record_sample(&mut metrics, *sample, Duration::from_millis(1), false, false);
        }

        let mean = samples.iter().map(|d| as_ms(*d)).sum::<f64>() / samples.len() as f64;
        assert!((metrics.avg_ms - mean).abs() < 1e-9);
        assert_eq!(metrics.min_time, Duration::from_micros(13));
        assert_eq!(metrics.max_time, Duration::from_micros(37 * 13));
    }

    #[test]
    fn test_ring_keeps_latest_samples() {
        let mut metrics = create_operation_metrics("hull", 3);
        for ms in 1..=5 {
            let elapsed = Duration::from_millis(ms);
            record_sample(&mut metrics, elapsed, Duration::from_secs(1), true, false);
        }
        let recent: Vec<u128> = metrics.recent.iter().map(|d| d.as_millis()).collect();
        assert_eq!(recent, vec![3, 4, 5]);
        assert!((recent_average_ms(&metrics) - 4.0).abs() < 1e-9);
        assert_eq!(metrics.total_calls, 5);
        assert_eq!(metrics.cache_hits, 5);
    }

    #[test]
    fn test_slow_samples_counted() {
        let mut metrics = create_operation_metrics("position", 10);
        let threshold = Duration::from_micros(200);
        assert!(!record_sample(&mut metrics, Duration::from_micros(200), threshold, false, false));
        assert!(record_sample(&mut metrics, Duration::from_micros(201), threshold, false, true));
        assert_eq!(metrics.slow_count, 1);
        assert_eq!(metrics.error_count, 1);
    }

    #[test]
    fn test_health_levels() {
        assert_eq!(classify_health(0.0, 0.0), HealthLevel::Excellent);
        assert_eq!(classify_health(0.02, 0.0), HealthLevel::Good);
        assert_eq!(classify_health(0.0, 0.2), HealthLevel::Fair);
        assert_eq!(classify_health(0.5, 0.0), HealthLevel::Poor);
    }
}
